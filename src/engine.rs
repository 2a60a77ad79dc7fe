//! Engine facade: owns the store, registries, caches and inferencer.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use oxigraph::io::RdfFormat;
use serde::{Deserialize, Serialize};

use crate::algebra::{BindingSet, Dataset, QueryModel};
use crate::error::{EngineError, SpinResult, StoreError};
use crate::function::{DefinitionParser, FunctionRegistry, TupleFunctionRegistry};
use crate::graph::connection::Connection;
use crate::graph::source::{FactSource, QueryEvaluator};
use crate::graph::sparql::{self, SparqlStore};
use crate::graph::vocab::rdf;
use crate::graph::{Iri, Statement, Term};
use crate::infer::hierarchy::ClassOrder;
use crate::infer::{
    ClassHierarchyCache, InferenceStats, InferencerConfig, RulePropertyCache, RulePropertyOrder,
    SchemaListener, SpinInferencer,
};
use crate::optimize::{EvaluationMode, FunctionResolver, MagicPropertyRewriter, QueryOptimizer};

/// Configuration for the spinfer engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How rewritten magic properties are evaluated (default: native).
    pub evaluation_mode: EvaluationMode,
    /// Data directory for the persistent store. `None` for memory-only mode.
    pub data_dir: Option<PathBuf>,
    /// Pre-register native XPath functions (default: true).
    pub standard_functions: bool,
    pub inferencer: InferencerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            evaluation_mode: EvaluationMode::Native,
            data_dir: None,
            standard_functions: true,
            inferencer: InferencerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> SpinResult<Self> {
        toml::from_str(content).map_err(|e| {
            EngineError::InvalidConfig {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Load a TOML configuration file.
    pub fn load(path: &Path) -> SpinResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EngineError::InvalidConfig {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }
}

/// The spinfer engine.
///
/// Every write goes through one notifying [`Connection`], so schema caches and
/// transient definitions stay in step with the facts and new statements feed
/// the next inference round.
pub struct Engine {
    config: EngineConfig,
    connection: Arc<Connection>,
    parser: Arc<DefinitionParser>,
    functions: Arc<FunctionRegistry>,
    tuple_functions: Arc<TupleFunctionRegistry>,
    hierarchy: Arc<ClassHierarchyCache>,
    rule_properties: Arc<RulePropertyCache>,
    inferencer: SpinInferencer,
}

impl Engine {
    /// Create an engine over an oxigraph store, persistent when
    /// `config.data_dir` is set.
    pub fn new(config: EngineConfig) -> SpinResult<Self> {
        let store = match config.data_dir {
            Some(ref dir) => {
                std::fs::create_dir_all(dir).map_err(|_| EngineError::DataDir {
                    path: dir.display().to_string(),
                })?;
                SparqlStore::open(&dir.join("oxigraph"))?
            }
            None => SparqlStore::in_memory()?,
        };
        tracing::info!(
            persistent = config.data_dir.is_some(),
            mode = ?config.evaluation_mode,
            "initializing spinfer engine"
        );
        let store = Arc::new(store);
        Ok(Self::with_backend(config, store.clone(), store))
    }

    /// Create an engine over any fact source and body evaluator.
    pub fn with_backend(
        config: EngineConfig,
        source: Arc<dyn FactSource>,
        evaluator: Arc<dyn QueryEvaluator>,
    ) -> Self {
        let functions = Arc::new(if config.standard_functions {
            FunctionRegistry::with_standard_functions()
        } else {
            FunctionRegistry::new()
        });
        let tuple_functions = Arc::new(TupleFunctionRegistry::new());
        let parser = Arc::new(DefinitionParser::new());
        let hierarchy = Arc::new(ClassHierarchyCache::new());
        let rule_properties = Arc::new(RulePropertyCache::new());

        let connection = Arc::new(Connection::new(source));
        connection.add_listener(Arc::new(SchemaListener::new(
            Arc::clone(&hierarchy),
            Arc::clone(&rule_properties),
            Arc::clone(&parser),
            Arc::clone(&functions),
            Arc::clone(&tuple_functions),
        )));

        let inferencer = SpinInferencer::new(
            config.inferencer.clone(),
            Arc::clone(&connection),
            evaluator,
            Arc::clone(&parser),
            Arc::clone(&hierarchy),
            Arc::clone(&rule_properties),
        );

        Self {
            config,
            connection,
            parser,
            functions,
            tuple_functions,
            hierarchy,
            rule_properties,
            inferencer,
        }
    }

    // -----------------------------------------------------------------------
    // Facts
    // -----------------------------------------------------------------------

    /// Add a statement. Returns `true` if it was new.
    pub fn add_statement(&self, statement: &Statement) -> SpinResult<bool> {
        Ok(self.connection.insert(statement)?)
    }

    /// Remove a statement. Returns `true` if it was present.
    pub fn remove_statement(&self, statement: &Statement) -> SpinResult<bool> {
        Ok(self.connection.remove(statement)?)
    }

    /// Parse RDF and add every statement. Returns how many were new.
    pub fn load(&self, format: RdfFormat, reader: impl Read) -> SpinResult<usize> {
        let statements = sparql::parse_statements(format, reader)?;
        self.connection.begin()?;
        let mut added = 0;
        for statement in &statements {
            if self.connection.insert(statement)? {
                added += 1;
            }
        }
        self.connection.commit()?;
        tracing::info!(parsed = statements.len(), added, "loaded statements");
        Ok(added)
    }

    /// Load a Turtle (`.ttl`) or N-Triples (`.nt`) file.
    pub fn load_file(&self, path: &Path) -> SpinResult<usize> {
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("nt") => RdfFormat::NTriples,
            Some("ttl") | None => RdfFormat::Turtle,
            Some(other) => {
                return Err(EngineError::InvalidConfig {
                    message: format!("unsupported RDF file extension .{other}"),
                }
                .into());
            }
        };
        let file = std::fs::File::open(path).map_err(|source| StoreError::Io { source })?;
        self.load(format, std::io::BufReader::new(file))
    }

    // -----------------------------------------------------------------------
    // Optimization
    // -----------------------------------------------------------------------

    /// Run function resolution, then magic-property rewriting, in place.
    pub fn optimize(
        &self,
        model: &mut QueryModel,
        dataset: Option<&Dataset>,
        bindings: &BindingSet,
    ) {
        if let Some(root) = model.root() {
            tracing::trace!(tree = %model.display(root), "query model before optimization");
        }

        FunctionResolver::new(&self.parser, self.connection.as_ref(), &self.functions)
            .optimize(model, dataset, bindings);
        MagicPropertyRewriter::new(
            &self.parser,
            self.connection.as_ref(),
            &self.tuple_functions,
            self.config.evaluation_mode,
        )
        .optimize(model, dataset, bindings);

        if let Some(root) = model.root() {
            tracing::trace!(tree = %model.display(root), "query model after optimization");
        }
    }

    // -----------------------------------------------------------------------
    // Inference
    // -----------------------------------------------------------------------

    /// Apply rules to an explicit set of changed statements.
    pub fn apply_rules(&mut self, changed: &[Statement]) -> SpinResult<usize> {
        Ok(self.inferencer.apply_rules(changed)?)
    }

    /// Run the forward-chaining driver over everything added since the last
    /// run.
    pub fn infer(&mut self) -> SpinResult<usize> {
        Ok(self.inferencer.infer()?)
    }

    /// Rule properties in execution order.
    pub fn rule_order(&self) -> SpinResult<Arc<RulePropertyOrder>> {
        let (order, _) = self.rule_properties.get_or_build(self.connection.as_ref())?;
        Ok(order)
    }

    /// The declared classes of `subject`, most specific first.
    pub fn class_order(&self, subject: &Term) -> SpinResult<ClassOrder> {
        let classes: Vec<Iri> = self
            .connection
            .objects(subject, rdf::TYPE)?
            .into_iter()
            .filter_map(|t| t.as_iri().cloned())
            .collect();
        Ok(self.hierarchy.order_classes(&classes, self.connection.as_ref())?)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The notifying connection every write goes through.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn tuple_functions(&self) -> &TupleFunctionRegistry {
        &self.tuple_functions
    }

    pub fn inferencer(&self) -> &SpinInferencer {
        &self.inferencer
    }

    pub fn stats(&self) -> &InferenceStats {
        self.inferencer.stats()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("functions", &self.functions.len())
            .field("tuple_functions", &self.tuple_functions.len())
            .finish()
    }
}
