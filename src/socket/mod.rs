pub mod connections;
pub mod fanout;
pub mod liveness;
pub mod packet;
pub mod session;
