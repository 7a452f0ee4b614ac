/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! CLI flags and TOML config for `zerotraced` (spec §6 "CLI surface
//! collaborator"), in the style of the teacher's `bin/darkirc/src/settings.rs`:
//! a `structopt` + `structopt_toml::StructOptToml` args struct backed by a
//! default config embedded via `include_str!`.

use serde::Deserialize;
use structopt::StructOpt;
use structopt_toml::StructOptToml;

pub const CONFIG_FILE: &str = "zerotraced_config.toml";
pub const CONFIG_FILE_CONTENTS: &str = include_str!("../zerotraced_config.toml");

#[derive(Clone, Debug, Deserialize, StructOpt, StructOptToml)]
#[serde(default)]
#[structopt(name = "zerotraced", about = "ZeroTrace node daemon")]
pub struct Args {
    /// Sets a custom config file
    #[structopt(long)]
    pub config: Option<String>,

    /// Loopback host to bind the local transport server to
    #[structopt(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Loopback port to bind the local transport server to
    #[structopt(long, default_value = "33331")]
    pub port: u16,

    /// Directory for the sealed keystore and embedded databases
    #[structopt(long, default_value = "~/.local/share/zerotrace")]
    pub data_dir: String,

    /// Run the transport server without the interactive menu (spec §6)
    #[structopt(long)]
    pub server_only: bool,

    /// Disable the I2P overlay and fall back to the developer-mode direct
    /// HTTP path (spec §1 non-goals: plaintext fallback as a dev-mode knob)
    #[structopt(long)]
    pub no_i2p: bool,

    /// Path to the i2pd binary, passed through to the overlay-process
    /// supervisor collaborator
    #[structopt(long)]
    pub i2pd_path: Option<String>,

    /// Path to the i2pd tunnels configuration, passed through to the
    /// overlay-process supervisor collaborator
    #[structopt(long)]
    pub tunnels_conf: Option<String>,

    /// Bootstrap peer addresses, `host:port` (repeatable flag)
    #[structopt(long)]
    pub bootstrap: Vec<String>,

    #[structopt(short, long)]
    /// Set log file to output into
    pub log: Option<String>,

    #[structopt(short, parse(from_occurrences))]
    /// Increase verbosity (-vvv supported)
    pub verbose: u8,
}

impl Args {
    pub fn data_dir_path(&self) -> std::path::PathBuf {
        shellexpand::tilde(&self.data_dir).into_owned().into()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
