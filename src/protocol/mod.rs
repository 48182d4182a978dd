//! Control protocol module for Pika
//!
//! This module implements the binary protocol spoken between the
//! controller and the exporter: fixed 8-byte frames over plain TCP.

mod codec;
mod digest;
mod types;

pub use codec::{read_frame, write_frame};
pub use digest::{client_id_for, client_id_of};
pub use types::{
    ClientId, Frame, FRAME_LEN, OP_BIND_REQUEST, OP_CONNECT_WITH_ID, OP_IS_REMOTE_REQUEST,
    OP_NOOP,
};
