/// APICap defines a capability supported by the service
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApiCap {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(bool, tag = "2")]
    pub enabled: bool,
    /// Unused. May be used for warnings in the future
    #[prost(bool, tag = "3")]
    pub deprecated: bool,
    /// Reason key for detection code
    #[prost(string, tag = "4")]
    pub disabled_reason: ::prost::alloc::string::String,
    /// Message to the user
    #[prost(string, tag = "5")]
    pub disabled_reason_msg: ::prost::alloc::string::String,
    /// Identifier that updated client could catch.
    #[prost(string, tag = "6")]
    pub disabled_alternative: ::prost::alloc::string::String,
}
