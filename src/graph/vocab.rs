//! IRIs of the RDF, RDFS, XSD and SPIN vocabularies the engine recognizes.

pub mod rdf {
    pub const NAMESPACE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const FIRST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#first";
    pub const REST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest";
    pub const NIL: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil";
    pub const LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
}

pub mod rdfs {
    pub const SUB_CLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
    pub const SUB_PROPERTY_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subPropertyOf";
    pub const COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
    pub const LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
}

pub mod xsd {
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
}

/// SPIN SPARQL syntax vocabulary.
pub mod sp {
    pub const NAMESPACE: &str = "http://spinrdf.org/sp#";
    pub const TEXT: &str = "http://spinrdf.org/sp#text";
    /// Prefix of the positional argument predicates `sp:arg1`, `sp:arg2`, ...
    pub const ARG_PREFIX: &str = "http://spinrdf.org/sp#arg";
}

/// SPIN modeling vocabulary.
pub mod spin {
    pub const NAMESPACE: &str = "http://spinrdf.org/spin#";
    pub const FUNCTION_CLASS: &str = "http://spinrdf.org/spin#Function";
    pub const MAGIC_PROPERTY_CLASS: &str = "http://spinrdf.org/spin#MagicProperty";
    pub const BODY: &str = "http://spinrdf.org/spin#body";
    pub const RETURN_TYPE: &str = "http://spinrdf.org/spin#returnType";
    pub const RULE: &str = "http://spinrdf.org/spin#rule";
    pub const NEXT_RULE_PROPERTY: &str = "http://spinrdf.org/spin#nextRuleProperty";
    pub const RULE_PROPERTY_MAX_ITERATION_COUNT: &str =
        "http://spinrdf.org/spin#rulePropertyMaxIterationCount";
    pub const CONSTRUCTOR: &str = "http://spinrdf.org/spin#constructor";
    pub const CONSTRAINT: &str = "http://spinrdf.org/spin#constraint";
    pub const CONSTRAINT_VIOLATION: &str = "http://spinrdf.org/spin#ConstraintViolation";
    pub const VIOLATION_ROOT: &str = "http://spinrdf.org/spin#violationRoot";
    pub const VIOLATION_PATH: &str = "http://spinrdf.org/spin#violationPath";
    pub const VIOLATION_VALUE: &str = "http://spinrdf.org/spin#violationValue";
    pub const VIOLATION_LEVEL: &str = "http://spinrdf.org/spin#violationLevel";
    pub const INFO: &str = "http://spinrdf.org/spin#Info";
    pub const WARNING: &str = "http://spinrdf.org/spin#Warning";
    pub const ERROR: &str = "http://spinrdf.org/spin#Error";
    pub const FATAL: &str = "http://spinrdf.org/spin#Fatal";
    pub const THIS_VAR: &str = "this";
    /// Marker linking a subject to each constructor already run on it.
    pub const EXECUTED: &str = "http://spinrdf.org/spin#_executed";
    /// Endpoint of the internal service that evaluates tuple functions.
    pub const TUPLE_FUNCTION_SERVICE: &str = "http://spinrdf.org/spin#_tuple_function_service";
}

/// SPIN standard library vocabulary.
pub mod spl {
    pub const NAMESPACE: &str = "http://spinrdf.org/spl#";
    pub const ARGUMENT: &str = "http://spinrdf.org/spl#Argument";
    pub const PREDICATE: &str = "http://spinrdf.org/spl#predicate";
    pub const VALUE_TYPE: &str = "http://spinrdf.org/spl#valueType";
    pub const OPTIONAL: &str = "http://spinrdf.org/spl#optional";
    pub const DEFAULT_VALUE: &str = "http://spinrdf.org/spl#defaultValue";
}

/// XPath functions registered natively by
/// [`with_standard_functions`](crate::function::FunctionRegistry::with_standard_functions).
pub mod fn_ {
    pub const NAMESPACE: &str = "http://www.w3.org/2005/xpath-functions#";
    pub const STANDARD: &[&str] = &[
        "http://www.w3.org/2005/xpath-functions#concat",
        "http://www.w3.org/2005/xpath-functions#contains",
        "http://www.w3.org/2005/xpath-functions#substring",
        "http://www.w3.org/2005/xpath-functions#string-length",
        "http://www.w3.org/2005/xpath-functions#upper-case",
        "http://www.w3.org/2005/xpath-functions#lower-case",
        "http://www.w3.org/2005/xpath-functions#starts-with",
        "http://www.w3.org/2005/xpath-functions#ends-with",
    ];
}
