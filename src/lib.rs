//! Wire-protocol client for the slither.io realtime snake game: handshake,
//! bit-packed frame parsing, a local world replica, and rate-limited
//! control output. Rendering and input capture live with the embedder; the
//! renderer reads [`game::world::WorldSnapshot`] and the input side feeds a
//! [`session::input::InputHandle`].

pub mod config;
pub mod game;
pub mod protocol;
pub mod session;
pub mod transport;
