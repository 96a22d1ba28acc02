mod connection;
pub mod dispatcher;
pub mod protocol;
pub mod websocket;

pub use connection::ConnectionHandler;
pub use dispatcher::Dispatcher;
pub use protocol::{ClientFrame, ServerFrame};
pub use websocket::{create_ws_router, WsAppState};
