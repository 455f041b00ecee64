//! Environment suites, selected by task names of the form `<suite>_<task>`.
mod dummy;
use anyhow::Result;
pub use dummy::DummyEnv;
use dynaloop_async_trainer::EnvFactory;
use dynaloop_core::{error::DynaloopError, Env};
use log::info;
use std::{collections::BTreeMap, sync::Arc};

/// Builds an environment of a suite, given the task within the suite and a seed.
pub type SuiteFactory = Arc<dyn Fn(&str, u64) -> Result<Box<dyn Env + Send>> + Send + Sync>;

/// Maps suite names to environment factories.
#[derive(Clone)]
pub struct EnvRegistry {
    suites: BTreeMap<String, SuiteFactory>,
}

impl Default for EnvRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl EnvRegistry {
    /// A registry without suites.
    pub fn empty() -> Self {
        Self {
            suites: BTreeMap::new(),
        }
    }

    /// A registry with the suites shipped with this crate.
    pub fn builtin() -> Self {
        Self::empty().register(
            "dummy",
            Arc::new(|task, seed| Ok(Box::new(DummyEnv::new(task, seed)?) as Box<dyn Env + Send>)),
        )
    }

    /// Adds a suite, replacing any suite of the same name.
    pub fn register(mut self, suite: &str, factory: SuiteFactory) -> Self {
        self.suites.insert(suite.to_string(), factory);
        self
    }

    /// Splits `<suite>_<task>` at the first underscore.
    pub fn split(task: &str) -> Result<(&str, &str)> {
        match task.split_once('_') {
            Some((suite, task)) if !suite.is_empty() => Ok((suite, task)),
            _ => Err(DynaloopError::Config(format!(
                "task '{}' is not of the form <suite>_<task>",
                task
            ))
            .into()),
        }
    }

    fn suite(&self, task: &str) -> Result<(&SuiteFactory, String)> {
        let (suite, name) = Self::split(task)?;
        match self.suites.get(suite) {
            Some(factory) => Ok((factory, name.to_string())),
            None => Err(DynaloopError::Config(format!(
                "unknown suite '{}', expected one of {:?}",
                suite,
                self.suites.keys().collect::<Vec<_>>()
            ))
            .into()),
        }
    }

    /// Rejects tasks of unknown suites.
    pub fn check(&self, task: &str) -> Result<()> {
        self.suite(task).map(|_| ())
    }

    /// Builds an environment for `task`.
    pub fn make(&self, task: &str, seed: u64) -> Result<Box<dyn Env + Send>> {
        let (factory, name) = self.suite(task)?;
        factory(&name, seed)
    }

    /// Factory for environment workers.
    ///
    /// Worker `id` after `restarts` restarts gets the seed
    /// `seed + 1000 * id + restarts`, so a rebuilt environment does not replay
    /// the failed one.
    pub fn env_factory(&self, task: &str, seed: u64) -> Result<EnvFactory> {
        let (factory, name) = self.suite(task)?;
        let factory = factory.clone();
        Ok(Arc::new(move |id, restarts| {
            let seed = seed + 1000 * id as u64 + restarts as u64;
            info!("Building {} for actor {} with seed {}", name, id, seed);
            factory(&name, seed)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split() -> Result<()> {
        assert_eq!(EnvRegistry::split("dummy_counter")?, ("dummy", "counter"));
        assert_eq!(EnvRegistry::split("crafter_reward_v2")?, ("crafter", "reward_v2"));
        assert!(EnvRegistry::split("dummy").is_err());
        assert!(EnvRegistry::split("_counter").is_err());
        Ok(())
    }

    #[test]
    fn test_unknown_suite() {
        let registry = EnvRegistry::builtin();
        assert!(registry.check("dummy_counter").is_ok());
        let err = registry.check("atari_pong").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DynaloopError>(),
            Some(DynaloopError::Config(_))
        ));
        assert!(registry.make("dummy_nothing", 0).is_err());
    }

    #[test]
    fn test_env_factory() -> Result<()> {
        let registry = EnvRegistry::builtin();
        let factory = registry.env_factory("dummy_counter", 5)?;
        let mut env = factory(1, 0)?;
        let obs = env.reset()?;
        assert!(obs.contains_key("token"));
        Ok(())
    }
}
