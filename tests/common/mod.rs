//! Integration test common infrastructure.
//!
//! Provides a scripted IRC server that the bot connects to, plus helpers
//! for building configurations that point at it.

pub mod server;

#[allow(unused_imports)]
pub use server::{MockPeer, MockServer};

use leetbot::config::{Config, ServerIdentity};

/// A config with one server pointing at `port` and the given channels.
#[allow(dead_code)]
pub fn config_for(port: u16, channels: &[&str]) -> Config {
    let mut config = Config::from_toml(
        r#"
[bot]
name = "leetbot"
quit_message = "Disconnecting"

[admin]
password = "hunter2"

[timeouts]
shutdown_secs = 2
reconnect_initial_secs = 1
"#,
    )
    .expect("test config parses");
    config.servers.push(identity_for(port, channels));
    config.console.enabled = false;
    config
}

/// A plaintext server entry named `mock`.
#[allow(dead_code)]
pub fn identity_for(port: u16, channels: &[&str]) -> ServerIdentity {
    channels.iter().fold(
        ServerIdentity::new("mock", "127.0.0.1", port, "leetbot"),
        |identity, channel| identity.with_channel(*channel, None),
    )
}
