/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use humanize_rs::ParseError;
use humanize_rs::bytes::Bytes;
use yaml_rust::{Yaml, yaml};

pub(super) fn normalize_key(raw: &str) -> String {
    raw.to_lowercase().replace('-', "_")
}

pub(super) fn foreach_kv<F>(table: &yaml::Hash, mut f: F) -> anyhow::Result<()>
where
    F: FnMut(&str, &Yaml) -> anyhow::Result<()>,
{
    for (k, v) in table.iter() {
        if let Yaml::String(key) = k {
            f(key, v).context(format!("failed to parse value of key {key}"))?;
        } else {
            return Err(anyhow!("key in hash should be string"));
        }
    }
    Ok(())
}

pub(super) fn as_hash(v: &Yaml) -> anyhow::Result<&yaml::Hash> {
    if let Yaml::Hash(map) = v {
        Ok(map)
    } else {
        Err(anyhow!("yaml value type should be 'map'"))
    }
}

pub(super) fn as_bool(v: &Yaml) -> anyhow::Result<bool> {
    match v {
        Yaml::String(s) => match s.to_lowercase().as_str() {
            "on" | "true" | "yes" | "1" => Ok(true),
            "off" | "false" | "no" | "0" => Ok(false),
            _ => Err(anyhow!("invalid yaml string value for 'bool': {s}")),
        },
        Yaml::Boolean(value) => Ok(*value),
        Yaml::Integer(i) => Ok(*i != 0),
        _ => Err(anyhow!(
            "yaml value type for 'bool' should be 'boolean' / 'string' / 'integer'"
        )),
    }
}

pub(super) fn as_usize(v: &Yaml) -> anyhow::Result<usize> {
    match v {
        Yaml::String(s) => Ok(usize::from_str(s)?),
        Yaml::Integer(i) => Ok(usize::try_from(*i)?),
        _ => Err(anyhow!(
            "yaml value type for 'usize' should be 'string' or 'integer'"
        )),
    }
}

pub(super) fn as_string(v: &Yaml) -> anyhow::Result<String> {
    match v {
        Yaml::String(s) => Ok(s.to_string()),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Real(s) => Ok(s.to_string()),
        _ => Err(anyhow!(
            "yaml value type for string should be 'string' / 'integer' / 'real'"
        )),
    }
}

pub(super) fn as_sockaddr(v: &Yaml) -> anyhow::Result<SocketAddr> {
    match v {
        Yaml::String(s) => {
            SocketAddr::from_str(s).map_err(|e| anyhow!("invalid socket address {s}: {e}"))
        }
        _ => Err(anyhow!(
            "yaml value type for 'SocketAddr' should be 'string'"
        )),
    }
}

/// A file path, relative ones are resolved against `lookup_dir`
pub(super) fn as_file_path(v: &Yaml, lookup_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Yaml::String(path) = v {
        let path = PathBuf::from_str(path).map_err(|e| anyhow!("invalid path: {e:?}"))?;
        match lookup_dir {
            Some(dir) if path.is_relative() => Ok(dir.join(path)),
            _ => Ok(path),
        }
    } else {
        Err(anyhow!("yaml value type for path should be string"))
    }
}

pub(super) fn as_humanize_usize(v: &Yaml) -> anyhow::Result<usize> {
    match v {
        Yaml::String(value) => {
            let v = value.parse::<Bytes>()?;
            Ok(v.size())
        }
        Yaml::Integer(value) => Ok(usize::try_from(*value)?),
        _ => Err(anyhow!(
            "yaml value type for humanize usize should be 'string' or 'integer'"
        )),
    }
}

pub(super) fn as_duration(v: &Yaml) -> anyhow::Result<Duration> {
    match v {
        Yaml::String(value) => match humanize_rs::duration::parse(value) {
            Ok(v) => Ok(v),
            Err(ParseError::MissingUnit) => {
                if let Ok(u) = u64::from_str(value) {
                    Ok(Duration::from_secs(u))
                } else if let Ok(f) = f64::from_str(value) {
                    Duration::try_from_secs_f64(f).map_err(anyhow::Error::new)
                } else {
                    Err(anyhow!("invalid duration string"))
                }
            }
            Err(e) => Err(anyhow!("invalid humanize duration string: {e}")),
        },
        Yaml::Integer(value) => {
            if let Ok(u) = u64::try_from(*value) {
                Ok(Duration::from_secs(u))
            } else {
                Err(anyhow!("unsupported duration string"))
            }
        }
        Yaml::Real(s) => {
            let f = f64::from_str(s).map_err(|e| anyhow!("invalid f64 value: {e}"))?;
            Duration::try_from_secs_f64(f).map_err(anyhow::Error::new)
        }
        _ => Err(anyhow!(
            "yaml value type for humanize duration should be 'string', 'integer' or 'real'"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yaml_rust::YamlLoader;

    fn value(s: &str) -> Yaml {
        YamlLoader::load_from_str(s).unwrap().pop().unwrap()
    }

    #[test]
    fn key() {
        assert_eq!(normalize_key("Log-File"), "log_file");
        assert_eq!(normalize_key("cache_expire"), "cache_expire");
    }

    #[test]
    fn bool_value() {
        assert!(as_bool(&value("true")).unwrap());
        assert!(as_bool(&value("'on'")).unwrap());
        assert!(!as_bool(&value("0")).unwrap());
        assert!(as_bool(&value("maybe")).is_err());
    }

    #[test]
    fn duration_value() {
        assert_eq!(
            as_duration(&value("30m")).unwrap(),
            Duration::from_secs(1800)
        );
        assert_eq!(as_duration(&value("5")).unwrap(), Duration::from_secs(5));
        assert_eq!(as_duration(&value("'0'")).unwrap(), Duration::ZERO);
        assert_eq!(
            as_duration(&value("1.5")).unwrap(),
            Duration::from_millis(1500)
        );
        assert!(as_duration(&value("[1]")).is_err());
    }

    #[test]
    fn path_value() {
        let dir = Path::new("/etc/g3collectd");
        assert_eq!(
            as_file_path(&value("types.db"), Some(dir)).unwrap(),
            PathBuf::from("/etc/g3collectd/types.db")
        );
        assert_eq!(
            as_file_path(&value("/usr/share/collectd/types.db"), Some(dir)).unwrap(),
            PathBuf::from("/usr/share/collectd/types.db")
        );
        assert_eq!(
            as_file_path(&value("types.db"), None).unwrap(),
            PathBuf::from("types.db")
        );
    }

    #[test]
    fn size_value() {
        assert_eq!(as_humanize_usize(&value("8KB")).unwrap(), 8000);
        assert_eq!(as_humanize_usize(&value("4096")).unwrap(), 4096);
    }
}
