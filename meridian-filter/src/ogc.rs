//! OGC Filter Encoding (WFS 1.1.0 subset) compilation.
//!
//! The filter document is parsed into a tagged AST ([`FilterNode`])
//! and then compiled by a recursive visitor returning
//! `Option<String>`: "no predicate" is a first-class result, not an
//! error. A node whose operands are missing or unrecognized simply
//! contributes nothing, and a document that is not well-formed XML
//! yields no filter at all — WFS clients routinely send sloppy filter
//! expressions and the read path answers them unfiltered rather than
//! rejecting the request. The one strict case: Between boundaries and
//! feature-id segments the client did supply must parse, because a
//! silent fallback there would change which rows match.

use crate::params::{BindValue, CompiledPredicate, SqlParams};
use crate::FilterError;
use meridian_core::{is_valid_identifier, XmlElement};

/// Comparison operators from the Filter Encoding comparison family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
        }
    }
}

/// Spatial predicate functions supported against envelope operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialOp {
    Intersects,
    Within,
    Contains,
}

impl SpatialOp {
    fn function(&self) -> &'static str {
        match self {
            SpatialOp::Intersects => "ST_Intersects",
            SpatialOp::Within => "ST_Within",
            SpatialOp::Contains => "ST_Contains",
        }
    }
}

/// Axis-aligned envelope in SRID 4326.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

/// Tagged filter AST.
///
/// Operand fields are `Option` so the parse stage never fails; the
/// compile stage turns missing operands into "no predicate".
#[derive(Debug, Clone)]
pub enum FilterNode {
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Not(Option<Box<FilterNode>>),
    Comparison {
        op: CompareOp,
        property: Option<String>,
        literal: Option<String>,
    },
    Like {
        property: Option<String>,
        literal: Option<String>,
        wild_card: String,
        single_char: String,
        escape_char: String,
        match_case: bool,
    },
    Null {
        property: Option<String>,
    },
    Between {
        property: Option<String>,
        lower: Option<String>,
        upper: Option<String>,
    },
    Bbox(Option<Envelope>),
    Spatial {
        op: SpatialOp,
        envelope: Option<Envelope>,
    },
    FeatureId(Option<i64>),
    Unknown,
}

impl FilterNode {
    /// Build the AST from a parsed filter element (or the `Filter`
    /// wrapper around one).
    pub fn from_element(elem: &XmlElement) -> FilterNode {
        match elem.name.as_str() {
            "Filter" => match elem.children.first() {
                Some(child) => FilterNode::from_element(child),
                None => FilterNode::Unknown,
            },
            "And" => FilterNode::And(elem.children.iter().map(FilterNode::from_element).collect()),
            "Or" => FilterNode::Or(elem.children.iter().map(FilterNode::from_element).collect()),
            "Not" => FilterNode::Not(
                elem.children
                    .first()
                    .map(|c| Box::new(FilterNode::from_element(c))),
            ),
            "PropertyIsEqualTo" => comparison(elem, CompareOp::Eq),
            "PropertyIsNotEqualTo" => comparison(elem, CompareOp::Ne),
            "PropertyIsLessThan" => comparison(elem, CompareOp::Lt),
            "PropertyIsGreaterThan" => comparison(elem, CompareOp::Gt),
            "PropertyIsLessThanOrEqualTo" => comparison(elem, CompareOp::Le),
            "PropertyIsGreaterThanOrEqualTo" => comparison(elem, CompareOp::Ge),
            "PropertyIsLike" => FilterNode::Like {
                property: property_name(elem),
                literal: literal_value(elem),
                wild_card: elem.attr("wildCard").unwrap_or("*").to_string(),
                single_char: elem.attr("singleChar").unwrap_or("?").to_string(),
                escape_char: elem.attr("escapeChar").unwrap_or("\\").to_string(),
                match_case: elem
                    .attr("matchCase")
                    .map(|v| v.eq_ignore_ascii_case("true"))
                    .unwrap_or(true),
            },
            "PropertyIsNull" => FilterNode::Null {
                property: property_name(elem),
            },
            "PropertyIsBetween" => FilterNode::Between {
                property: property_name(elem),
                lower: boundary_literal(elem, "LowerBoundary"),
                upper: boundary_literal(elem, "UpperBoundary"),
            },
            "BBOX" => FilterNode::Bbox(envelope(elem)),
            "Intersects" => FilterNode::Spatial {
                op: SpatialOp::Intersects,
                envelope: envelope(elem),
            },
            "Within" => FilterNode::Spatial {
                op: SpatialOp::Within,
                envelope: envelope(elem),
            },
            "Contains" => FilterNode::Spatial {
                op: SpatialOp::Contains,
                envelope: envelope(elem),
            },
            "FeatureId" | "GmlObjectId" => {
                let fid = elem.attr("fid").or_else(|| elem.attr("id"));
                FilterNode::FeatureId(fid.and_then(trailing_id))
            }
            _ => FilterNode::Unknown,
        }
    }

    /// Compile this node to a SQL clause, allocating bind parameters.
    ///
    /// `Ok(None)` means the node contributes no predicate.
    pub fn compile(&self, params: &mut SqlParams) -> Result<Option<String>, FilterError> {
        match self {
            FilterNode::And(children) => compile_junction(children, "AND", params),
            FilterNode::Or(children) => compile_junction(children, "OR", params),
            FilterNode::Not(child) => {
                let Some(child) = child else {
                    return Ok(None);
                };
                Ok(child.compile(params)?.map(|c| format!("NOT ({c})")))
            }
            FilterNode::Comparison {
                op,
                property,
                literal,
            } => {
                let (Some(prop), Some(lit)) = (valid_property(property), literal.as_ref()) else {
                    return Ok(None);
                };
                let p = params.push(BindValue::Text(lit.clone()));
                Ok(Some(format!("(properties->>'{prop}') {} {p}", op.sql())))
            }
            FilterNode::Like {
                property,
                literal,
                wild_card,
                single_char,
                escape_char,
                match_case,
            } => {
                let (Some(prop), Some(lit)) = (valid_property(property), literal.as_ref()) else {
                    return Ok(None);
                };
                let pattern = translate_like_pattern(lit, wild_card, single_char, escape_char);
                let op = if *match_case { "LIKE" } else { "ILIKE" };
                let p = params.push(BindValue::Text(pattern));
                Ok(Some(format!("(properties->>'{prop}') {op} {p}")))
            }
            FilterNode::Null { property } => {
                let Some(prop) = valid_property(property) else {
                    return Ok(None);
                };
                Ok(Some(format!("(properties->>'{prop}') IS NULL")))
            }
            FilterNode::Between {
                property,
                lower,
                upper,
            } => {
                let (Some(prop), Some(lower), Some(upper)) =
                    (valid_property(property), lower.as_ref(), upper.as_ref())
                else {
                    return Ok(None);
                };
                let lower: f64 = parse_numeric_literal(lower)?;
                let upper: f64 = parse_numeric_literal(upper)?;
                let lo = params.push(BindValue::Float(lower));
                let hi = params.push(BindValue::Float(upper));
                Ok(Some(format!(
                    "(properties->>'{prop}')::numeric BETWEEN {lo} AND {hi}"
                )))
            }
            FilterNode::Bbox(env) => Ok(env.map(|e| spatial_clause(SpatialOp::Intersects, e, params))),
            FilterNode::Spatial { op, envelope } => {
                Ok(envelope.map(|e| spatial_clause(*op, e, params)))
            }
            FilterNode::FeatureId(id) => Ok(id.map(|id| {
                let p = params.push(BindValue::Int(id));
                format!("id = {p}")
            })),
            FilterNode::Unknown => Ok(None),
        }
    }
}

/// Compile OGC Filter XML onto a predicate.
///
/// Returns `Ok(true)` when a clause was added; malformed XML yields
/// `Ok(false)` — absence of filtering, not a request failure.
pub fn compile_ogc_filter(
    filter_xml: &str,
    predicate: &mut CompiledPredicate,
) -> Result<bool, FilterError> {
    let Ok(root) = XmlElement::parse(filter_xml) else {
        tracing::debug!("unparseable filter XML ignored");
        return Ok(false);
    };
    compile_filter_element(&root, predicate)
}

/// Compile an already-parsed filter element onto a predicate.
///
/// Used by the transaction processor, which extracts the `Filter`
/// sub-element from a larger document before compiling it.
pub fn compile_filter_element(
    elem: &XmlElement,
    predicate: &mut CompiledPredicate,
) -> Result<bool, FilterError> {
    let node = FilterNode::from_element(elem);
    match node.compile(&mut predicate.params)? {
        Some(clause) => {
            predicate.clauses.push(clause);
            Ok(true)
        }
        None => Ok(false),
    }
}

fn comparison(elem: &XmlElement, op: CompareOp) -> FilterNode {
    FilterNode::Comparison {
        op,
        property: property_name(elem),
        literal: literal_value(elem),
    }
}

fn property_name(elem: &XmlElement) -> Option<String> {
    elem.descendant("PropertyName")
        .map(|e| e.text_trimmed().to_string())
        .filter(|s| !s.is_empty())
}

fn literal_value(elem: &XmlElement) -> Option<String> {
    elem.descendant("Literal")
        .map(|e| e.text_trimmed().to_string())
}

fn boundary_literal(elem: &XmlElement, boundary: &str) -> Option<String> {
    elem.descendant(boundary)
        .and_then(|b| b.descendant("Literal"))
        .map(|l| l.text_trimmed().to_string())
}

fn envelope(elem: &XmlElement) -> Option<Envelope> {
    let env = elem.descendant("Envelope")?;
    let (minx, miny) = corner(env, "lowerCorner")?;
    let (maxx, maxy) = corner(env, "upperCorner")?;
    Some(Envelope {
        minx,
        miny,
        maxx,
        maxy,
    })
}

fn corner(env: &XmlElement, name: &str) -> Option<(f64, f64)> {
    let text = env.descendant(name)?.text_trimmed().to_string();
    let mut parts = text.split_whitespace();
    let x: f64 = parts.next()?.parse().ok()?;
    let y: f64 = parts.next()?.parse().ok()?;
    Some((x, y))
}

/// Trailing numeric segment of a dotted feature id (`"gis:uuid.123"`).
fn trailing_id(fid: &str) -> Option<i64> {
    fid.rsplit('.').next()?.parse().ok()
}

fn valid_property(property: &Option<String>) -> Option<&str> {
    let prop = property.as_deref()?;
    if is_valid_identifier(prop) {
        Some(prop)
    } else {
        tracing::debug!(property = prop, "filter property failed identifier validation");
        None
    }
}

fn parse_numeric_literal(lit: &str) -> Result<f64, FilterError> {
    lit.parse().map_err(|_| {
        FilterError::Validation(format!("boundary literal '{lit}' is not numeric"))
    })
}

fn compile_junction(
    children: &[FilterNode],
    joiner: &str,
    params: &mut SqlParams,
) -> Result<Option<String>, FilterError> {
    let mut clauses = Vec::new();
    for child in children {
        if let Some(clause) = child.compile(params)? {
            clauses.push(clause);
        }
    }
    if clauses.is_empty() {
        Ok(None)
    } else {
        Ok(Some(format!("({})", clauses.join(&format!(" {joiner} ")))))
    }
}

fn spatial_clause(op: SpatialOp, env: Envelope, params: &mut SqlParams) -> String {
    let a = params.push(BindValue::Float(env.minx));
    let b = params.push(BindValue::Float(env.miny));
    let c = params.push(BindValue::Float(env.maxx));
    let d = params.push(BindValue::Float(env.maxy));
    format!(
        "{}(geom, ST_MakeEnvelope({a}, {b}, {c}, {d}, 4326))",
        op.function()
    )
}

/// Translate an OGC LIKE literal into SQL LIKE syntax.
///
/// Escaped wildcards are parked on private placeholder characters
/// first so the unescaped-wildcard substitution cannot touch them,
/// then restored as literal characters.
fn translate_like_pattern(
    literal: &str,
    wild_card: &str,
    single_char: &str,
    escape_char: &str,
) -> String {
    let mut pattern = literal.to_string();
    pattern = pattern.replace(&format!("{escape_char}{wild_card}"), "\u{0}");
    pattern = pattern.replace(&format!("{escape_char}{single_char}"), "\u{1}");
    pattern = pattern.replace(wild_card, "%");
    pattern = pattern.replace(single_char, "_");
    pattern = pattern.replace('\u{0}', wild_card);
    pattern = pattern.replace('\u{1}', single_char);
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(xml: &str) -> (CompiledPredicate, bool) {
        let mut pred = CompiledPredicate::new();
        let added = compile_ogc_filter(xml, &mut pred).unwrap();
        (pred, added)
    }

    #[test]
    fn equality_comparison() {
        let (pred, added) = compile(
            "<Filter><PropertyIsEqualTo>\
             <PropertyName>status</PropertyName><Literal>active</Literal>\
             </PropertyIsEqualTo></Filter>",
        );
        assert!(added);
        assert_eq!(pred.clauses, vec!["(properties->>'status') = $1"]);
        assert_eq!(
            pred.params.values(),
            &[BindValue::Text("active".to_string())]
        );
    }

    #[test]
    fn and_of_equality_and_bbox() {
        let (pred, added) = compile(
            "<Filter><And>\
             <PropertyIsEqualTo><PropertyName>status</PropertyName>\
             <Literal>active</Literal></PropertyIsEqualTo>\
             <BBOX><Envelope>\
             <lowerCorner>0 0</lowerCorner><upperCorner>10 10</upperCorner>\
             </Envelope></BBOX>\
             </And></Filter>",
        );
        assert!(added);
        assert_eq!(pred.clauses.len(), 1);
        let clause = &pred.clauses[0];
        assert!(clause.contains("(properties->>'status') = $1"));
        assert!(clause.contains(" AND "));
        assert!(clause.contains("ST_Intersects(geom, ST_MakeEnvelope($2, $3, $4, $5, 4326))"));
        assert_eq!(pred.params.len(), 5);
    }

    #[test]
    fn malformed_xml_yields_no_filter_not_an_error() {
        let (pred, added) = compile("<Filter><And></Filter>");
        assert!(!added);
        assert!(pred.is_unconstrained());
    }

    #[test]
    fn empty_and_yields_no_predicate() {
        let (pred, added) = compile("<Filter><And><Bogus/></And></Filter>");
        assert!(!added);
        assert!(pred.is_unconstrained());
    }

    #[test]
    fn unknown_tag_is_silently_ignored() {
        let (_, added) = compile("<Filter><SomeFutureOperator/></Filter>");
        assert!(!added);
    }

    #[test]
    fn comparison_without_literal_yields_nothing() {
        let (_, added) = compile(
            "<Filter><PropertyIsEqualTo><PropertyName>a</PropertyName>\
             </PropertyIsEqualTo></Filter>",
        );
        assert!(!added);
    }

    #[test]
    fn not_negates_child() {
        let (pred, _) = compile(
            "<Filter><Not><PropertyIsNull>\
             <PropertyName>name</PropertyName>\
             </PropertyIsNull></Not></Filter>",
        );
        assert_eq!(pred.clauses, vec!["NOT ((properties->>'name') IS NULL)"]);
        assert!(pred.params.is_empty());
    }

    #[test]
    fn like_escaped_wildcard_stays_literal() {
        let (pred, _) = compile(
            "<Filter><PropertyIsLike wildCard=\"*\" singleChar=\"?\" escapeChar=\"\\\">\
             <PropertyName>name</PropertyName><Literal>100\\*pure*</Literal>\
             </PropertyIsLike></Filter>",
        );
        // escaped * survives as a literal asterisk; bare * becomes %
        assert_eq!(
            pred.params.values(),
            &[BindValue::Text("100*pure%".to_string())]
        );
        assert!(pred.clauses[0].contains("LIKE"));
    }

    #[test]
    fn like_match_case_false_uses_ilike() {
        let (pred, _) = compile(
            "<Filter><PropertyIsLike matchCase=\"false\">\
             <PropertyName>name</PropertyName><Literal>a*</Literal>\
             </PropertyIsLike></Filter>",
        );
        assert_eq!(pred.clauses, vec!["(properties->>'name') ILIKE $1"]);
        assert_eq!(pred.params.values(), &[BindValue::Text("a%".to_string())]);
    }

    #[test]
    fn between_binds_numeric_bounds() {
        let (pred, _) = compile(
            "<Filter><PropertyIsBetween><PropertyName>pop</PropertyName>\
             <LowerBoundary><Literal>10</Literal></LowerBoundary>\
             <UpperBoundary><Literal>20</Literal></UpperBoundary>\
             </PropertyIsBetween></Filter>",
        );
        assert_eq!(
            pred.clauses,
            vec!["(properties->>'pop')::numeric BETWEEN $1 AND $2"]
        );
        assert_eq!(
            pred.params.values(),
            &[BindValue::Float(10.0), BindValue::Float(20.0)]
        );
    }

    #[test]
    fn between_with_non_numeric_bound_is_a_validation_error() {
        let mut pred = CompiledPredicate::new();
        let result = compile_ogc_filter(
            "<Filter><PropertyIsBetween><PropertyName>pop</PropertyName>\
             <LowerBoundary><Literal>low</Literal></LowerBoundary>\
             <UpperBoundary><Literal>20</Literal></UpperBoundary>\
             </PropertyIsBetween></Filter>",
            &mut pred,
        );
        assert!(result.is_err());
    }

    #[test]
    fn feature_id_matches_trailing_segment() {
        let (pred, _) = compile(
            "<Filter><FeatureId fid=\"gis:0b6d1c2e-aaaa-bbbb-cccc-000000000000.123\"/></Filter>",
        );
        assert_eq!(pred.clauses, vec!["id = $1"]);
        assert_eq!(pred.params.values(), &[BindValue::Int(123)]);
    }

    #[test]
    fn spatial_within_uses_function_name() {
        let (pred, _) = compile(
            "<Filter><Within><PropertyName>Shape</PropertyName><Envelope>\
             <lowerCorner>1 2</lowerCorner><upperCorner>3 4</upperCorner>\
             </Envelope></Within></Filter>",
        );
        assert!(pred.clauses[0].starts_with("ST_Within(geom,"));
    }

    #[test]
    fn injection_in_property_name_yields_no_predicate() {
        let (pred, added) = compile(
            "<Filter><PropertyIsEqualTo>\
             <PropertyName>a') IS NULL; DROP TABLE x;--</PropertyName>\
             <Literal>v</Literal></PropertyIsEqualTo></Filter>",
        );
        assert!(!added);
        assert!(pred.is_unconstrained());
    }
}
