use super::objects::{Layout, layout_to_object};
use super::router::Registry;
use crate::config::SharedConfig;
use crate::lightdm::SessionFacade;
use crate::read_lock;
use color_eyre::Result;
use serde_json::Value;
use std::sync::Arc;

/// The `greeter_config` accessor: a read-only view of the config.
pub struct GreeterConfig {
    config: SharedConfig,
    session: Arc<dyn SessionFacade>,
    time_language: String,
}

impl GreeterConfig {
    pub fn new(config: SharedConfig, session: Arc<dyn SessionFacade>) -> Self {
        let time_language = read_lock!(config)
            .greeter
            .time_language
            .clone()
            .unwrap_or_default();

        Self {
            config,
            session,
            time_language,
        }
    }

    fn greeter(&self) -> Result<Value> {
        let mut greeter = read_lock!(self.config).greeter.clone();
        greeter.time_language = Some(self.time_language.clone());
        Ok(serde_json::to_value(greeter)?)
    }

    /// The daemon's layouts which are also configured, in daemon order.
    fn layouts(&self) -> Vec<Layout> {
        let preferred = read_lock!(self.config)
            .layouts
            .iter()
            .map(|name| name.replace(char::is_whitespace, "\t"))
            .collect::<Vec<_>>();

        self.session
            .layouts()
            .iter()
            .filter(|layout| preferred.contains(&layout.name()))
            .filter_map(|layout| layout_to_object(Some(layout.as_ref())))
            .collect()
    }

    pub fn registry() -> Registry<Self> {
        Registry::<Self>::new()
            .property("branding", |c| {
                Ok(serde_json::to_value(&read_lock!(c.config).branding)?)
            })
            .property("greeter", Self::greeter)
            .property("features", |c| {
                Ok(serde_json::to_value(&read_lock!(c.config).features)?)
            })
            .property("layouts", |c| Ok(serde_json::to_value(c.layouts())?))
    }
}
