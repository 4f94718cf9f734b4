//! CLI execution context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use cart_client::{CartApi, CatalogEntry, HttpCartClient, MemoryCartServer};
use cart_core::Currency;
use cart_sync::{CartController, DrawerHandle};

use crate::config::{CliConfig, CONFIG_NAMES};
use crate::output::Output;

/// Execution context for CLI commands.
pub struct Context {
    /// CLI configuration.
    pub config: CliConfig,
    /// Where the config was loaded from, if anywhere.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
    /// Talk to the in-memory demo store.
    pub offline: bool,
}

/// A controller wired to a drawer for one command.
pub struct Session {
    pub cart: CartController,
    pub drawer: DrawerHandle,
}

impl Context {
    /// Load context from config file.
    pub fn load(config_path: Option<&str>, offline: bool, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let (config, config_path) = match config_path {
            Some(path) => (CliConfig::load(path)?, Some(PathBuf::from(path))),
            None => match Self::find_config(&cwd) {
                Some(path) => (CliConfig::load(&path.to_string_lossy())?, Some(path)),
                None => (CliConfig::default(), None),
            },
        };

        Ok(Self {
            config,
            config_path,
            output,
            cwd,
            offline,
        })
    }

    /// Find config file in directory tree.
    fn find_config(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            for name in CONFIG_NAMES {
                let candidate = current.join(name);
                if candidate.exists() {
                    return Some(candidate);
                }
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Build the cart client for this run.
    pub fn client(&self) -> Result<Arc<dyn CartApi>> {
        if self.offline {
            self.output.debug("using the in-memory demo store");
            return Ok(Arc::new(demo_store()));
        }
        self.output
            .debug(&format!("using store {}", self.config.client.base_url));
        let client = HttpCartClient::new(&self.config.client)
            .with_context(|| format!("Failed to create client for {}", self.config.client.base_url))?;
        Ok(Arc::new(client))
    }

    /// Build a controller and the drawer it renders into.
    pub fn session(&self) -> Result<Session> {
        self.session_with(self.client()?)
    }

    pub fn session_with(&self, api: Arc<dyn CartApi>) -> Result<Session> {
        let drawer = DrawerHandle::new();
        let cart = CartController::new(api, drawer.clone(), self.config.sync.clone())
            .context("Invalid sync configuration")?;
        Ok(Session { cart, drawer })
    }
}

/// Variant ids in the demo store.
pub mod demo {
    pub const LINEN_SHIRT: u64 = 40001;
    pub const WOOL_SOCKS: u64 = 40002;
    pub const CANVAS_TOTE: u64 = 40003;
    pub const ENAMEL_MUG: u64 = 40004;
    pub const LIMITED_PRINT: u64 = 40005;
}

/// A small store with two lines already in the cart.
pub fn demo_store() -> MemoryCartServer {
    MemoryCartServer::new(Currency::USD)
        .with_product(CatalogEntry::new(demo::LINEN_SHIRT, "Linen Shirt", 4500).with_variant_title("M"))
        .with_product(CatalogEntry::new(demo::WOOL_SOCKS, "Wool Socks", 1200))
        .with_product(CatalogEntry::new(demo::CANVAS_TOTE, "Canvas Tote", 2500))
        .with_product(CatalogEntry::new(demo::ENAMEL_MUG, "Enamel Mug", 1800).with_variant_title("Blue"))
        .with_product(CatalogEntry::new(demo::LIMITED_PRINT, "Limited Print", 9000).with_inventory(1))
        .with_discount_code("WELCOME10", 10)
        .with_line(demo::LINEN_SHIRT, 1)
        .with_line(demo::WOOL_SOCKS, 2)
}
