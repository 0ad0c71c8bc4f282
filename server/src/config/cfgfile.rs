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

use super::{parse_replicaof, ConfigError, ConfigurationSet};
use serde::Deserialize;

/// The decoded configuration file: everything is optional so a file only
/// has to mention what it wants to change
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
pub struct DecodedConfiguration {
    pub system: Option<DecodedSystem>,
}

#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
pub struct DecodedSystem {
    pub port: Option<u16>,
    pub dir: Option<String>,
    pub dbfilename: Option<String>,
    /// a `"<host> <port>"` string, like the CLI flag
    pub replicaof: Option<String>,
}

/// Read and deserialize a configuration file
pub fn load(file: &str) -> Result<DecodedConfiguration, ConfigError> {
    let raw = std::fs::read_to_string(file)
        .map_err(|e| ConfigError::FileError(format!("reading {file}: {e}")))?;
    decode(&raw)
}

pub fn decode(raw: &str) -> Result<DecodedConfiguration, ConfigError> {
    serde_yaml::from_str(raw).map_err(|e| ConfigError::FileError(e.to_string()))
}

/// Layer decoded file values over the given set
pub fn apply(
    decoded: DecodedConfiguration,
    mut cfg: ConfigurationSet,
) -> Result<ConfigurationSet, ConfigError> {
    let Some(system) = decoded.system else {
        return Ok(cfg);
    };
    if let Some(port) = system.port {
        cfg.port = port;
    }
    if let Some(dir) = system.dir {
        cfg.dir = dir;
    }
    if let Some(dbfilename) = system.dbfilename {
        cfg.dbfilename = dbfilename;
    }
    if let Some(replicaof) = system.replicaof {
        cfg.replicaof = Some(parse_replicaof(&replicaof)?);
    }
    Ok(cfg)
}
