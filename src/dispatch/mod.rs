mod sharded_dispatcher;

pub use sharded_dispatcher::*;
