use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

const CONFIG_ENV_VAR: &str =
  "TASKDECKRC";
const CONFIG_FILE_NAME: &str =
  ".taskdeckrc";
const DEFAULT_DATA_DIR: &str =
  "~/.taskdeck";

/// Flat `key = value` settings with
/// `include` support. Later sources win.
#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self::with_defaults()
  }
}

impl Config {
  pub fn with_defaults() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      ("data.location", DEFAULT_DATA_DIR),
      ("store.backend", "file"),
      ("store.latency", "0"),
      ("color", "on")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }

    Config {
      map,
      loaded_files: vec![]
    }
  }

  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::with_defaults();

    match resolve_config_path(
      config_override
    )? {
      | Some(path) => {
        info!(config = %path.display(), "loading config file");
        cfg.load_file(&path)?;
      }
      | None => {
        warn!(
          "no config file found; \
           using defaults"
        );
      }
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    parse_bool(raw).map(Some).ok_or_else(
      || {
        anyhow!(
          "config key {key} expects \
           on/off, got {raw:?}"
        )
      }
    )
  }

  pub fn get_u64(
    &self,
    key: &str
  ) -> anyhow::Result<Option<u64>> {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    raw
      .trim()
      .parse::<u64>()
      .map(Some)
      .with_context(|| {
        format!(
          "config key {key} expects \
           a whole number, got {raw:?}"
        )
      })
  }

  /// Parse rc text into this config.
  /// `origin` anchors relative includes
  /// and error messages.
  pub fn load_str(
    &mut self,
    text: &str,
    origin: &Path
  ) -> anyhow::Result<()> {
    let base_dir = origin
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let line = raw_line
        .split_once('#')
        .map_or(raw_line, |(before, _)| {
          before
        })
        .trim();
      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %origin.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            origin.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    if self.loaded_files.contains(&path)
    {
      return Err(anyhow!(
        "config include cycle at {}",
        path.display()
      ));
    }

    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());
    self.load_str(&text, &path)
  }
}

/// Data directory for the file store:
/// `--data`, then `data.location`.
#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else {
    let raw = cfg
      .get("data.location")
      .unwrap_or_else(|| {
        DEFAULT_DATA_DIR.to_string()
      });
    expand_tilde(Path::new(&raw))
  };

  if dir.starts_with("~") {
    return Err(anyhow!(
      "cannot determine home \
       directory for {}",
      dir.display()
    ));
  }

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(from_env) =
    std::env::var(CONFIG_ENV_VAR)
  {
    if from_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      from_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping \
       config lookup"
    );
    return Ok(None);
  };
  let candidate =
    home.join(CONFIG_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
  match s.trim().to_ascii_lowercase().as_str()
  {
    | "1" | "y" | "yes" | "on" | "true" => {
      Some(true)
    }
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}
