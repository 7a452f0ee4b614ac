/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! ZeroTrace: a decentralized, quantum-resistant peer-to-peer messaging
//! library. See the module docs for the three core subsystems — the
//! cryptographic envelope (`crypto`), the routing engine (`routing`), and
//! the Kademlia DHT (`dht`) — plus the persistent stores and transport that
//! bind them together into a `Node`.

pub mod crypto;
pub mod dht;
pub mod error;
pub mod model;
pub mod net;
pub mod node;
pub mod routing;
pub mod store;
pub mod system;
pub mod util;

pub use error::{Error, Result};
pub use node::{Node, NodePtr};
