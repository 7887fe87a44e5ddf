use config::{Config, Environment, File};
use once_cell::sync::Lazy;
use rocket::serde::Deserialize;

static DEFAULT_BASEDIR: &str = "/tmp";
const DEFAULT_PORT: u16 = 8080;

/// config properties for the whole of this application
#[derive(Deserialize, Clone)]
pub struct StorageConfig {
    /// the directory whose contents are indexed and served
    pub basedir: String,
    pub port: u16,
}

/// Builds the config from defaults, the optional ./Storage.toml file, and
/// the BASEDIR/PORT environment variables, in increasing precedence.
/// If this fails to parse, the application will panic.
pub fn parse_config() -> StorageConfig {
    let builder = Config::builder()
        .set_default("basedir", DEFAULT_BASEDIR)
        .unwrap()
        .set_default("port", DEFAULT_PORT as i64)
        .unwrap()
        .add_source(File::with_name("./Storage").required(false))
        .add_source(Environment::default())
        .build();
    match builder {
        Ok(settings) => match settings.try_deserialize() {
            Ok(config) => config,
            Err(e) => panic!("Failed to read config values. Exception is {e}"),
        },
        Err(e) => panic!("Failed to load config. Exception is {e}"),
    }
}

/// global variable for config, that way it doesn't need to be repeatedly parsed
pub static STORAGE_CONFIG: Lazy<StorageConfig> = Lazy::new(parse_config);
