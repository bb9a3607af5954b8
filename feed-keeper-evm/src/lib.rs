pub mod decoder;
pub mod opsgenie;
pub mod rpc;

pub use decoder::JsonPackageDecoder;
pub use opsgenie::OpsgenieSink;
pub use rpc::JsonRpcClient;
