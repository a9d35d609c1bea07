use figment::providers::Env;
use figment::Figment;
use std::sync::OnceLock;

static CONFIG: OnceLock<Figment> = OnceLock::new();

pub fn get_config() -> &'static Figment {
    CONFIG.get_or_init(new_figment)
}

/// Configuration from `REGIFLOW_`-prefixed environment variables. Merging the
/// split and unsplit forms lets `REGIFLOW_CUBE_URL` resolve as the nested key
/// `cube.url` while `REGIFLOW_POLL_INTERVAL` resolves as `poll_interval`.
pub(crate) fn new_figment() -> Figment {
    Figment::new()
        .merge(Env::prefixed("REGIFLOW_").split("_"))
        .merge(Env::prefixed("REGIFLOW_"))
}
