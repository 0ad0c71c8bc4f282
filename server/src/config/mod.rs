/*
 * Created on Tue Mar 29 2022
 *
 * This file is a part of Cardinal
 * Cardinal is a free and open-source in-memory data structure server that
 * speaks the RESP wire protocol, written by Sayan Nandan ("the Author") with
 * the vision of providing a familiar, fast and predictable keyspace without
 * compromising on correctness.
 *
 * Copyright (c) 2022, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # Configuration
//!
//! Configuration comes from two layered sources: an optional YAML file
//! (`--config <file>`) and command-line flags, with flags winning. The
//! result is an immutable [`ConfigurationSet`] whose string surface backs
//! `CONFIG GET`. Unknown flags are fatal.

mod cfgfile;
#[cfg(test)]
mod tests;

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

// server defaults
const DEFAULT_IPV4: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
const DEFAULT_PORT: u16 = 6379;
const DEFAULT_DIR: &str = "./";
const DEFAULT_DBFILENAME: &str = "dump.rdb";

#[derive(Debug, Clone, PartialEq, Eq)]
/// The final configuration set used by the server
pub struct ConfigurationSet {
    /// the directory holding the dump file
    pub dir: String,
    /// the dump file name inside `dir`
    pub dbfilename: String,
    /// the host to bind to
    pub host: IpAddr,
    /// the port to bind to
    pub port: u16,
    /// the leader to follow, if any (this makes us a follower)
    pub replicaof: Option<(String, u16)>,
}

impl Default for ConfigurationSet {
    fn default() -> Self {
        ConfigurationSet {
            dir: DEFAULT_DIR.to_owned(),
            dbfilename: DEFAULT_DBFILENAME.to_owned(),
            host: DEFAULT_IPV4,
            port: DEFAULT_PORT,
            replicaof: None,
        }
    }
}

impl ConfigurationSet {
    /// The `CONFIG GET` surface: recognised parameter names to their
    /// current string values
    pub fn get_param(&self, param: &str) -> Option<String> {
        match param {
            "dir" => Some(self.dir.clone()),
            "dbfilename" => Some(self.dbfilename.clone()),
            "port" => Some(self.port.to_string()),
            _ => None,
        }
    }
    /// The full path to the dump file
    pub fn snapshot_path(&self) -> PathBuf {
        PathBuf::from(&self.dir).join(&self.dbfilename)
    }
    pub const fn is_follower(&self) -> bool {
        self.replicaof.is_some()
    }
}

#[derive(Debug, PartialEq, Eq)]
/// Errors that can occur while parsing the configuration. All of them are
/// fatal at startup
pub enum ConfigError {
    UnknownFlag(String),
    MissingValue(String),
    BadValue(String, String),
    FileError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownFlag(flag) => write!(f, "unknown flag `{flag}`"),
            Self::MissingValue(flag) => write!(f, "flag `{flag}` expects a value"),
            Self::BadValue(flag, value) => {
                write!(f, "bad value `{value}` for flag `{flag}`")
            }
            Self::FileError(e) => write!(f, "config file error: {e}"),
        }
    }
}

/// Parse the process configuration from the environment's argument vector
pub fn get_config() -> Result<ConfigurationSet, ConfigError> {
    parse_args(std::env::args().skip(1))
}

/// Parse configuration flags from an argument iterator
///
/// A `--config <file>` flag is resolved first so that every other flag
/// overrides what the file said.
pub fn parse_args(args: impl IntoIterator<Item = String>) -> Result<ConfigurationSet, ConfigError> {
    let args: Vec<String> = args.into_iter().collect();
    let mut cfg = match find_config_file(&args)? {
        Some(file) => cfgfile::apply(cfgfile::load(&file)?, ConfigurationSet::default())?,
        None => ConfigurationSet::default(),
    };
    let mut iter = args.into_iter();
    while let Some(flag) = iter.next() {
        if flag == "--config" {
            // already resolved above; skip its value
            iter.next();
            continue;
        }
        let mut value_for = |flag: &str| {
            iter.next()
                .ok_or_else(|| ConfigError::MissingValue(flag.to_owned()))
        };
        match flag.as_str() {
            "--dir" => cfg.dir = value_for("--dir")?,
            "--dbfilename" => cfg.dbfilename = value_for("--dbfilename")?,
            "--port" => {
                let raw = value_for("--port")?;
                cfg.port = raw
                    .parse()
                    .map_err(|_| ConfigError::BadValue("--port".to_owned(), raw))?;
            }
            "--replicaof" => {
                let raw = value_for("--replicaof")?;
                cfg.replicaof = Some(parse_replicaof(&raw)?);
            }
            unknown => return Err(ConfigError::UnknownFlag(unknown.to_owned())),
        }
    }
    Ok(cfg)
}

fn find_config_file(args: &[String]) -> Result<Option<String>, ConfigError> {
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        if flag == "--config" {
            return match iter.next() {
                Some(file) => Ok(Some(file.clone())),
                None => Err(ConfigError::MissingValue("--config".to_owned())),
            };
        }
    }
    Ok(None)
}

/// Split a `"<host> <port>"` value into its parts
fn parse_replicaof(raw: &str) -> Result<(String, u16), ConfigError> {
    let bad = || ConfigError::BadValue("--replicaof".to_owned(), raw.to_owned());
    let mut parts = raw.split_whitespace();
    let host = parts.next().ok_or_else(bad)?.to_owned();
    let port = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    if parts.next().is_some() {
        return Err(bad());
    }
    Ok((host, port))
}
