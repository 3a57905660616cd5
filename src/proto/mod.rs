//! Protobuf types and gRPC client stubs for the BuildKit APIs consumed through the tunnel
//!
//! The files included here are kept in the shape `tonic-build` emits, trimmed to the
//! messages and methods this crate uses, so building the crate needs neither `protoc`
//! nor network access. Unknown fields sent by newer engines are skipped on decode.

pub mod moby {
    pub mod buildkit {
        pub mod v1 {
            include!("moby.buildkit.v1.rs");

            pub mod apicaps {
                include!("moby.buildkit.v1.apicaps.rs");
            }

            pub mod frontend {
                include!("moby.buildkit.v1.frontend.rs");
            }
        }
    }
}

pub mod pb {
    include!("pb.rs");
}

pub mod google {
    pub mod rpc {
        include!("google.rpc.rs");
    }
}

// Re-export commonly used types
pub use moby::buildkit::v1::*;
