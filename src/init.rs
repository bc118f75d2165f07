//! Explicit setup: logging plus the bundle registry
//!
//! Nothing happens at load time. Callers run [`initialize`] once and keep
//! the returned [`Environment`].

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::accessor::PriceDataAccessor;
use crate::bundle::Bundle;
use crate::calendar::{calendar_by_name, TradingCalendar};
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};

pub struct Environment {
    config: AnalyticsConfig,
    calendar: Arc<dyn TradingCalendar>,
    registry: BTreeMap<String, PathBuf>,
    loaded: HashMap<String, Arc<Bundle>>,
}

/// Install the tracing subscriber and register the bundles under
/// `config.bundle_root`.
pub fn initialize(config: &AnalyticsConfig) -> Result<Environment> {
    init_tracing(&config.log_filter);

    let calendar = calendar_by_name(&config.calendar)?;

    let root = &config.bundle_root;
    if !root.is_dir() {
        return Err(AnalyticsError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("bundle root {} does not exist", root.display()),
        )));
    }

    let mut registry = BTreeMap::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            registry.insert(name.to_string(), path.clone());
        }
    }

    info!(
        root = %root.display(),
        bundles = registry.len(),
        calendar = calendar.name(),
        "analytics environment ready"
    );

    Ok(Environment {
        config: config.clone(),
        calendar,
        registry,
        loaded: HashMap::new(),
    })
}

/// A second install fails inside tracing-subscriber; that is fine, the
/// first subscriber stays.
fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

impl Environment {
    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn calendar(&self) -> Arc<dyn TradingCalendar> {
        Arc::clone(&self.calendar)
    }

    /// Registered bundle names, sorted
    pub fn bundles(&self) -> Vec<String> {
        self.registry.keys().cloned().collect()
    }

    pub fn bundle_path(&self, name: &str) -> Result<&Path> {
        self.registry
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| AnalyticsError::UnknownBundle(name.to_string()))
    }

    /// Load a registered bundle; later calls return the same instance
    pub fn load_bundle(&mut self, name: &str) -> Result<Arc<Bundle>> {
        if let Some(bundle) = self.loaded.get(name) {
            debug!(bundle = name, "bundle already loaded");
            return Ok(Arc::clone(bundle));
        }

        let path = self.bundle_path(name)?.to_path_buf();
        let bundle = Arc::new(Bundle::load(&path, name)?);
        self.loaded.insert(name.to_string(), Arc::clone(&bundle));
        Ok(bundle)
    }

    /// Accessor over the configured bundle and calendar
    pub fn accessor<S: AsRef<str>>(&mut self, coins: &[S]) -> Result<PriceDataAccessor> {
        let name = self.config.bundle.clone();
        let bundle = self.load_bundle(&name)?;
        Ok(PriceDataAccessor::new(self.calendar(), coins, bundle)?.with_cache_policy(self.config.cache))
    }
}
