// config.rs: user format definitions loaded from JSON, plus a reloading cache
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use crate::error::{Error, Result};
use crate::format::{Format, FormatDefinition};
use crate::preset;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatConfig {
    pub version: Option<u32>,
    /// Format used when the caller does not name one.
    pub default: Option<String>,
    #[serde(default)]
    pub formats: Vec<FormatDefinition>,
}

pub struct LoadedFormats {
    pub path: String,
    pub mtime: Option<SystemTime>,
    pub default: Option<String>,
    pub formats: Vec<Arc<Format>>,
}

impl LoadedFormats {
    pub fn get(&self, name: &str) -> Option<Arc<Format>> {
        self.formats.iter().find(|f| f.name() == name).cloned()
    }

    /// Resolve a format by name: user formats, then presets. Without a name the
    /// configured default is used, else the fallback preset.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<Format>> {
        match name.or(self.default.as_deref()) {
            Some(n) => self
                .get(n)
                .or_else(|| preset::preset(n))
                .ok_or_else(|| Error::UnknownFormat(n.to_string())),
            None => Ok(preset::default_format()),
        }
    }
}

pub static FORMAT_CACHE: Lazy<RwLock<Option<LoadedFormats>>> = Lazy::new(|| RwLock::new(None));

fn build_formats(config: FormatConfig) -> Result<Vec<Arc<Format>>> {
    let mut names: HashSet<&str> = HashSet::new();
    for def in &config.formats {
        if preset::preset(&def.name).is_some() || !names.insert(&def.name) {
            return Err(Error::DuplicateFormat(def.name.clone()));
        }
    }
    config.formats.iter().map(|def| def.compile().map(Arc::new)).collect()
}

fn read_mtime(path: &Path) -> Option<SystemTime> { fs::metadata(path).ok().and_then(|m| m.modified().ok()) }

/// Parse and compile a config document. Any invalid format rejects the whole
/// document so a partially activated config is never published.
pub fn formats_from_json(json: &str, path: &str) -> Result<LoadedFormats> {
    let config: FormatConfig = serde_json::from_str(json)?;
    if let Some(v) = config.version {
        if v != 1 {
            return Err(Error::UnsupportedConfigVersion(v));
        }
    }
    let default = config.default.clone();
    let formats = build_formats(config)?;
    let loaded = LoadedFormats { path: path.to_string(), mtime: None, default, formats };
    if let Some(name) = loaded.default.as_deref() {
        loaded.resolve(Some(name))?;
    }
    Ok(loaded)
}

pub fn load_formats_internal(config_path: &str) -> Result<LoadedFormats> {
    let data = fs::read_to_string(config_path)
        .map_err(|source| Error::ReadConfig { path: config_path.to_string(), source })?;
    let mut loaded = formats_from_json(&data, config_path)?;
    loaded.mtime = read_mtime(Path::new(config_path));
    tracing::info!(path = config_path, formats = loaded.formats.len(), "loaded format config");
    Ok(loaded)
}

/// Load `config_path` into `slot` unless it already holds that path with an
/// unchanged modification time. Returns true when the entry was replaced.
pub fn refresh_formats(slot: &mut Option<LoadedFormats>, config_path: &str) -> Result<bool> {
    let need_reload = match slot.as_ref() {
        None => true,
        Some(lf) => lf.path != config_path || read_mtime(Path::new(config_path)) != lf.mtime,
    };
    if need_reload {
        *slot = Some(load_formats_internal(config_path)?);
    }
    Ok(need_reload)
}

/// [`refresh_formats`] against the process-wide [`FORMAT_CACHE`].
pub fn ensure_formats_loaded(config_path: &str) -> Result<bool> {
    let mut guard = FORMAT_CACHE.write().unwrap_or_else(PoisonError::into_inner);
    refresh_formats(&mut guard, config_path)
}

/// Resolve a format against the cached config, or against the presets when no
/// config has been loaded.
pub fn resolve_format(name: Option<&str>) -> Result<Arc<Format>> {
    let guard = FORMAT_CACHE.read().unwrap_or_else(PoisonError::into_inner);
    match guard.as_ref() {
        Some(lf) => lf.resolve(name),
        None => match name {
            Some(n) => preset::preset(n).ok_or_else(|| Error::UnknownFormat(n.to_string())),
            None => Ok(preset::default_format()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
      "version": 1,
      "default": "timed",
      "formats": [
        { "name": "timed", "description": "combined plus duration", "layout": "%h %l %u %t \"%r\" %>s %b %D" },
        { "name": "tiny", "regex": "^(?P<remote_addr>\\S+) (?P<status>\\d{3})$" }
      ]
    }"#;

    #[test]
    fn test_formats_from_json() {
        let loaded = formats_from_json(CONFIG, "mem").expect("config");
        assert_eq!(loaded.formats.len(), 2);
        let timed = loaded.resolve(None).unwrap();
        assert_eq!(timed.name(), "timed");
        let map = timed
            .apply(r#"10.0.0.1 - - [24/Feb/2025:12:34:56 +0000] "GET / HTTP/1.1" 200 12 5120"#)
            .unwrap();
        assert_eq!(map["request_time_us"].as_deref(), Some("5120"));
        let tiny = loaded.resolve(Some("tiny")).unwrap();
        assert!(tiny.apply("10.0.0.1 404").is_some());
        // presets stay reachable by name
        assert_eq!(loaded.resolve(Some("combined")).unwrap().name(), "combined");
        assert!(matches!(loaded.resolve(Some("nope")), Err(Error::UnknownFormat(_))));
    }

    #[test]
    fn test_config_rejections() {
        let bad_version = r#"{"version": 2, "formats": []}"#;
        assert!(matches!(formats_from_json(bad_version, "mem"), Err(Error::UnsupportedConfigVersion(2))));

        let unsupported = r#"{"formats": [{"name": "x", "layout": "%h %{X-RANDOM-IP}i"}]}"#;
        assert!(matches!(formats_from_json(unsupported, "mem"), Err(Error::UnsupportedDirective { .. })));

        let dup = r#"{"formats": [{"name": "x", "layout": "%h"}, {"name": "x", "layout": "%u"}]}"#;
        assert!(matches!(formats_from_json(dup, "mem"), Err(Error::DuplicateFormat(_))));

        let shadow = r#"{"formats": [{"name": "common", "layout": "%h"}]}"#;
        assert!(matches!(formats_from_json(shadow, "mem"), Err(Error::DuplicateFormat(_))));

        let missing_default = r#"{"default": "ghost", "formats": []}"#;
        assert!(matches!(formats_from_json(missing_default, "mem"), Err(Error::UnknownFormat(_))));

        assert!(matches!(formats_from_json("{", "mem"), Err(Error::ParseConfig(_))));
    }

    #[test]
    fn test_empty_config_falls_back_to_default_preset() {
        let loaded = formats_from_json("{}", "mem").unwrap();
        assert_eq!(loaded.resolve(None).unwrap().name(), preset::DEFAULT_FORMAT_NAME);
    }

    fn temp_config(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("accesslog_core_{}_{}.json", tag, std::process::id()))
    }

    #[test]
    fn test_load_and_cache_from_file() {
        let tmp = temp_config("cache");
        fs::write(&tmp, CONFIG).unwrap();
        let path = tmp.to_str().unwrap();

        assert!(ensure_formats_loaded(path).expect("load"));
        assert_eq!(resolve_format(None).unwrap().name(), "timed");
        assert!(!ensure_formats_loaded(path).expect("cached"));
        assert!(resolve_format(Some("tiny")).is_ok());
        fs::remove_file(&tmp).ok();

        let missing = temp_config("missing");
        let err = load_formats_internal(missing.to_str().unwrap()).err().unwrap();
        assert!(matches!(err, Error::ReadConfig { .. }));
    }

    #[test]
    fn test_refresh_reloads_when_mtime_changes() {
        use std::time::Duration;

        let tmp = temp_config("reload");
        fs::write(&tmp, CONFIG).unwrap();
        let path = tmp.to_str().unwrap();

        let mut slot = None;
        assert!(refresh_formats(&mut slot, path).unwrap());
        assert!(!refresh_formats(&mut slot, path).unwrap());
        assert_eq!(slot.as_ref().unwrap().resolve(None).unwrap().name(), "timed");

        fs::write(&tmp, CONFIG.replace(r#""default": "timed""#, r#""default": "tiny""#)).unwrap();
        // the rewrite can land within the filesystem's mtime resolution
        let bumped = SystemTime::now() + Duration::from_secs(5);
        fs::File::options().write(true).open(&tmp).unwrap().set_modified(bumped).unwrap();

        assert!(refresh_formats(&mut slot, path).unwrap());
        let loaded = slot.as_ref().unwrap();
        assert_eq!(loaded.default.as_deref(), Some("tiny"));
        assert_eq!(loaded.resolve(None).unwrap().name(), "tiny");
        assert!(!refresh_formats(&mut slot, path).unwrap());
        fs::remove_file(&tmp).ok();
    }
}
