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

use super::*;

fn parse(args: &[&str]) -> Result<ConfigurationSet, ConfigError> {
    parse_args(args.iter().map(|s| (*s).to_owned()))
}

#[test]
fn no_args_gives_defaults() {
    let cfg = parse(&[]).unwrap();
    assert_eq!(cfg, ConfigurationSet::default());
    assert_eq!(cfg.port, 6379);
    assert!(!cfg.is_follower());
}

#[test]
fn all_flags() {
    let cfg = parse(&[
        "--dir",
        "/tmp/data",
        "--dbfilename",
        "mine.rdb",
        "--port",
        "7000",
        "--replicaof",
        "127.0.0.1 6379",
    ])
    .unwrap();
    assert_eq!(cfg.dir, "/tmp/data");
    assert_eq!(cfg.dbfilename, "mine.rdb");
    assert_eq!(cfg.port, 7000);
    assert_eq!(cfg.replicaof, Some(("127.0.0.1".to_owned(), 6379)));
    assert!(cfg.is_follower());
}

#[test]
fn unknown_flag_is_fatal() {
    assert_eq!(
        parse(&["--nonsense"]).unwrap_err(),
        ConfigError::UnknownFlag("--nonsense".to_owned())
    );
}

#[test]
fn missing_value_is_fatal() {
    assert_eq!(
        parse(&["--port"]).unwrap_err(),
        ConfigError::MissingValue("--port".to_owned())
    );
}

#[test]
fn bad_port_is_fatal() {
    assert!(matches!(
        parse(&["--port", "70000"]).unwrap_err(),
        ConfigError::BadValue(_, _)
    ));
}

#[test]
fn bad_replicaof_is_fatal() {
    assert!(parse(&["--replicaof", "onlyhost"]).is_err());
    assert!(parse(&["--replicaof", "host notaport"]).is_err());
    assert!(parse(&["--replicaof", "host 1 extra"]).is_err());
}

#[test]
fn config_get_surface() {
    let cfg = parse(&["--dir", "/data"]).unwrap();
    assert_eq!(cfg.get_param("dir"), Some("/data".to_owned()));
    assert_eq!(cfg.get_param("dbfilename"), Some("dump.rdb".to_owned()));
    assert_eq!(cfg.get_param("maxmemory"), None);
}

#[test]
fn snapshot_path_joins_dir_and_file() {
    let cfg = parse(&["--dir", "/data", "--dbfilename", "x.rdb"]).unwrap();
    assert_eq!(cfg.snapshot_path(), std::path::PathBuf::from("/data/x.rdb"));
}

#[test]
fn file_values_decode() {
    let decoded = cfgfile::decode(
        r#"
system:
  port: 7007
  dir: /var/lib/cardinal
"#,
    )
    .unwrap();
    let cfg = cfgfile::apply(decoded, ConfigurationSet::default()).unwrap();
    assert_eq!(cfg.port, 7007);
    assert_eq!(cfg.dir, "/var/lib/cardinal");
    assert_eq!(cfg.dbfilename, "dump.rdb");
}

#[test]
fn cli_overrides_file() {
    let path = std::env::temp_dir().join("cardinal-cfgfile-layering.yaml");
    std::fs::write(&path, "system:\n  port: 7007\n  dir: /from-file\n").unwrap();
    let cfg = parse(&["--config", path.to_str().unwrap(), "--port", "9009"]).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(cfg.port, 9009);
    assert_eq!(cfg.dir, "/from-file");
}

#[test]
fn missing_config_file_is_fatal() {
    assert!(matches!(
        parse(&["--config", "/definitely/not/here.yaml"]).unwrap_err(),
        ConfigError::FileError(_)
    ));
}
