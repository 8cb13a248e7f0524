// Parameter Factories
// Build one parameter tree per task from configuration: constants,
// persisted seed counters, the optional user combinator expression,
// RNG and requirement injection

use crate::config::param::{ParamConfig, ParamValue};
use crate::config::{ConfigError, ConfigView};
use crate::expression::{Evaluator, Value};
use crate::params::basic::{ConstSource, CounterSource, LookupSource, RequirementSource, RngSource};
use crate::params::meta::{RepeatSource, ZipLongSource};
use crate::params::registry::SourceRegistry;
use crate::params::source::{ParameterSource, Requirement};
use crate::params::ParameterError;

use rand::Rng;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_NSEEDS: i64 = 10;

/// Builds the parameter tree from configuration alone.
///
/// The raw tree is ZipLong(constants, [user sub-tree], lookups, RNG,
/// requirement injector), wrapped in Repeat when a repeat factor above
/// one is configured. Options are read frozen: reconfiguring one after
/// the tree was built is a change-impossible fault.
pub struct BasicParameterFactory {
    view: Arc<dyn ConfigView>,
    pconfig: ParamConfig,
}

impl BasicParameterFactory {
    pub fn new(view: Arc<dyn ConfigView>) -> Self {
        let pconfig = ParamConfig::new(view.clone(), true);
        Self { view, pconfig }
    }

    pub fn param_config(&self) -> &ParamConfig {
        &self.pconfig
    }

    /// Build the tree for a task with the given resolved requirements.
    pub fn source(
        &self,
        requirements: Vec<Requirement>,
    ) -> Result<Box<dyn ParameterSource>, ParameterError> {
        self.assemble(None, requirements)
    }

    fn assemble(
        &self,
        user: Option<Box<dyn ParameterSource>>,
        requirements: Vec<Requirement>,
    ) -> Result<Box<dyn ParameterSource>, ParameterError> {
        let (constants, lookups) = self.constant_sources()?;
        let seeds = self.seed_sources()?;

        let mut children: Vec<Box<dyn ParameterSource>> = constants;
        children.extend(seeds);
        if let Some(user) = user {
            children.push(user);
        }
        // Lookups go after the user sub-tree so the variables they key
        // on are already filled into the row.
        children.extend(lookups);
        children.push(Box::new(RngSource::new("JOB_RANDOM", rand::random())));
        children.push(Box::new(RequirementSource::new(requirements)));

        let repeat = self.view.get_int("repeat", Some(1))?;
        debug!(children = children.len(), repeat, "assembled parameter tree");

        let raw: Box<dyn ParameterSource> = Box::new(ZipLongSource::new(children));
        if repeat > 1 {
            return Ok(Box::new(RepeatSource::new(raw, repeat as u64)?));
        }
        Ok(raw)
    }

    /// Tagged constant options: a plain value becomes a Const source,
    /// one with a `<name> lookup` option becomes a table lookup.
    fn constant_sources(
        &self,
    ) -> Result<(Vec<Box<dyn ParameterSource>>, Vec<Box<dyn ParameterSource>>), ParameterError>
    {
        let mut constants: Vec<Box<dyn ParameterSource>> = Vec::new();
        let mut lookups: Vec<Box<dyn ParameterSource>> = Vec::new();
        for name in self.view.get_list("constants", Some(""))? {
            let lookup_key = self.pconfig.get(&name, Some("lookup"), Some(""))?;
            if lookup_key.is_empty() {
                let value = self.pconfig.get(&name, None, None)?;
                constants.push(Box::new(ConstSource::new(name.to_uppercase(), value)));
                continue;
            }
            match self.pconfig.get_parameter(&name)? {
                ParamValue::Dict(table) => lookups.push(Box::new(LookupSource::new(
                    name.to_uppercase(),
                    lookup_key.to_uppercase(),
                    table,
                ))),
                _ => {
                    return Err(ParameterError::CreateFailed {
                        name: name.clone(),
                        message: format!("constant {name:?} has a lookup option but no dict value"),
                    })
                }
            }
        }
        Ok((constants, lookups))
    }

    /// Seed counters `SEED_0 .. SEED_{n-1}`. Freshly generated seeds
    /// are persisted through the accessor so restarted runs reproduce
    /// identical values.
    fn seed_sources(&self) -> Result<Vec<Box<dyn ParameterSource>>, ParameterError> {
        let nseeds = self.view.get_int("nseeds", Some(DEFAULT_NSEEDS))?;
        let generated: Vec<String> = {
            let mut rng = rand::thread_rng();
            (0..nseeds.max(0))
                .map(|_| rng.gen_range(0..1_000_000_000i64).to_string())
                .collect()
        };
        let seeds = self.view.get_list_persistent("seeds", &generated)?;

        let mut sources: Vec<Box<dyn ParameterSource>> = Vec::new();
        for (index, seed) in seeds.iter().enumerate() {
            let base = seed
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidValue {
                    option: "seeds".to_string(),
                    value: seed.clone(),
                    expected: "integer",
                })?;
            sources.push(Box::new(CounterSource::new(format!("SEED_{index}"), base)));
        }
        Ok(sources)
    }
}

/// Basic factory plus an optional user combinator expression.
///
/// The `parameters` option is evaluated by the restricted expression
/// interpreter; the only callable names are the registry's
/// constructors. The resulting sub-tree is zipped into the raw source.
pub struct ModularParameterFactory {
    base: BasicParameterFactory,
    registry: SourceRegistry,
}

impl ModularParameterFactory {
    pub fn new(view: Arc<dyn ConfigView>, registry: SourceRegistry) -> Self {
        Self {
            base: BasicParameterFactory::new(view),
            registry,
        }
    }

    pub fn source(
        &self,
        requirements: Vec<Requirement>,
    ) -> Result<Box<dyn ParameterSource>, ParameterError> {
        let expr = self.base.pconfig.get("parameters", None, Some(""))?;
        if expr.trim().is_empty() {
            return self.base.assemble(None, requirements);
        }
        let evaluator = Evaluator::with_sources(&self.registry, &self.base.pconfig);
        let user = match evaluator.eval_text(expr.trim())? {
            Value::Source(source) => source,
            other => {
                return Err(ParameterError::CreateFailed {
                    name: "parameters".to_string(),
                    message: format!(
                        "expression yields {}, expected a parameter source",
                        other.type_name()
                    ),
                })
            }
        };
        self.base.assemble(Some(user), requirements)
    }
}
