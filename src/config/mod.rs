use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use directories::BaseDirs;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(&default_config_path())
    }

    pub fn load_from(config_path: &Path) -> Self {
        let mut map = default_map();

        // Read .statbenchrc if exists
        if config_path.exists() {
            if let Ok(file) = fs::File::open(config_path) {
                let reader = BufReader::new(file);
                for line in reader.lines().map_while(Result::ok) {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((k, v)) = line.split_once('=') {
                        map.insert(k.trim().to_string(), v.trim().to_string());
                    }
                }
            }
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(normalize_key(&k).to_string(), v);
            }
        }

        Self {
            inner: map,
            config_path: config_path.to_path_buf(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        // ENV first, bare or STATBENCH_-prefixed
        if let Ok(v) = env::var(format!("STATBENCH_{key}")) {
            return Some(v);
        }
        if let Ok(v) = env::var(key) {
            return Some(v);
        }
        self.inner.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(PathBuf::from)
    }

    pub fn rscript_path(&self) -> PathBuf {
        self.get_path("RSCRIPT_PATH")
            .unwrap_or_else(|| PathBuf::from("Rscript"))
    }

    pub fn r_library_path(&self) -> PathBuf {
        self.get_path("R_LIBRARY_PATH")
            .unwrap_or_else(|| data_dir().join("library"))
    }
}

fn is_config_key(k: &str) -> bool {
    // Accept known keys or STATBENCH_* for forward-compat
    KEYS.contains(&k) || k.starts_with("STATBENCH_")
}

fn normalize_key(k: &str) -> &str {
    k.strip_prefix("STATBENCH_").unwrap_or(k)
}

const KEYS: &[&str] = &[
    "RSCRIPT_PATH",
    "R_LIBRARY_PATH",
    "BINARY_REPO_URL",
    "SOURCE_REPO_URL",
    "INIT_MAX_RETRIES",
    "INIT_BACKOFF_MS",
    "INIT_WAIT_TIMEOUT",
    "DEFAULT_LOCALE",
    "PRETTIFY_MARKDOWN",
];

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("statbench").join(".statbenchrc")
}

fn data_dir() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.data_dir().to_path_buf())
        .unwrap_or_else(env::temp_dir)
        .join("statbench")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();
    // Paths
    m.insert("RSCRIPT_PATH".into(), "Rscript".into());
    m.insert(
        "R_LIBRARY_PATH".into(),
        data_dir().join("library").to_string_lossy().into_owned(),
    );

    // Package repositories: binary first, source fallback
    m.insert(
        "BINARY_REPO_URL".into(),
        "https://packagemanager.posit.co/cran/latest".into(),
    );
    m.insert("SOURCE_REPO_URL".into(), "https://cloud.r-project.org".into());

    // Numbers
    m.insert("INIT_MAX_RETRIES".into(), "3".into());
    m.insert("INIT_BACKOFF_MS".into(), "1000".into());
    m.insert("INIT_WAIT_TIMEOUT".into(), "600".into());

    // Strings
    m.insert("DEFAULT_LOCALE".into(), "en".into());

    // Bools as strings
    m.insert("PRETTIFY_MARKDOWN".into(), "true".into());

    m
}
