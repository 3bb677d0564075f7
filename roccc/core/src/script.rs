//! Scripts for the SUIF pass driver.
//!
//! The optimization script loads `$1.suif`, runs a fixed pipeline, and
//! splices in the loop transformations requested by a pass file at the
//! `### INSERT` markers.
use crate::directives::{PassBuckets, PassDirective, PassTag};
use crate::template::{Expander, Substitutions, Template};

pub const OPTIMIZE_TEMPLATE: &str = "\
require basicnodes suifnodes cfenodes transforms control_flow_analysis ;
require jasonOutputPass global_transforms utility_transforms array_transforms loop_transforms ;
require bit_vector_dataflow_analysis gcc_preprocessing_transforms verifyRoccc ;
require preprocessing_transforms data_dependence_analysis optimizer_output ;
require fifoIdentification DetermineReusePair ;
load $1.suif ;
PreprocessPass ;
FlattenStatementListsPass ;
ControlFlowSolvePass ;
DataFlowSolvePass2 ;
UD_DU_ChainBuilderPass2 ;
ConstantPropagationAndFoldingPass ;
ConstantQualedArrayPropagationPass ;
ConstantPropagationAndFoldingPass ;
### INSERT FULLY_UNROLL_STATEMENT
### INSERT PARTIALLY_UNROLL_STATEMENT
### INSERT GENERATE_TILE_STATEMENT
### INSERT GENERATE_SYSTOLIC_ARRAY_UNROLL_STATEMENT
### INSERT GENERATE_SYSTOLIC_ARRAY_INTERCHANGE_STATEMENT
TemporalCSEPass ;
FlattenStatementListsPass ;
ControlFlowSolvePass ;
DataFlowSolvePass2 ;
UD_DU_ChainBuilderPass2 ;
LoopInfoPass ;
PreprocessingPass ;
CopyPropagationPass2 ;
ScalarReplacementPass ;
### INSERT GENERATE_SYSTOLIC_ARRAY_FEEDBACK_ELIMINATE_STATEMENT
IfConversionPass ;
FifoIdentification ;
DetermineReusePairs ;
ControlFlowSolvePass ;
DataFlowSolvePass2 ;
UD_DU_ChainBuilderPass2 ;
OutputIdentificationPass ;
VerifyPass ;
OutputPass ;
StripAnnotesPass ;
";

/// Registers a module in the IP library. `$1` is the file prefix, `$2` the
/// module name and `$3` the library directory.
pub const ADD_MODULE_TEMPLATE: &str = "\
require basicnodes suifnodes cfenodes transforms control_flow_analysis ;
require jasonOutputPass libraryOutputPass global_transforms utility_transforms array_transforms ;
require bit_vector_dataflow_analysis gcc_preprocessing_transforms verifyRoccc ;
require preprocessing_transforms data_dependence_analysis ;
require fifoIdentification ;
load $1.suif ;
CleanRepositoryPass $3 ; AddModulePass $2 $3 ; DumpHeaderPass $3 ;
";

fn pass(words: &[&str]) -> String {
    format!("{} ;", words.join(" "))
}

fn after(mut lines: Vec<String>, tail: &[&str]) -> Vec<String> {
    if !lines.is_empty() {
        lines.extend(tail.iter().map(|name| pass(&[*name])));
    }
    lines
}

impl Expander for PassBuckets {
    fn expand(&self, tag: &str) -> Option<Vec<String>> {
        let lines = match tag {
            "FULLY_UNROLL_STATEMENT" => after(
                self.get(PassTag::FullUnroll)
                    .iter()
                    .filter_map(|d| match d {
                        PassDirective::FullUnroll { label } => {
                            Some(pass(&["UnrollConstantBoundsPass", label.as_str(), "0"]))
                        }
                        _ => None,
                    })
                    .collect(),
                &["FlattenStatementListsPass", "FusePass"],
            ),
            "PARTIALLY_UNROLL_STATEMENT" => after(
                self.get(PassTag::PartialUnroll)
                    .iter()
                    .filter_map(|d| match d {
                        PassDirective::PartialUnroll { label, factor } => {
                            Some(pass(&["UnrollPass", label.as_str(), &factor.to_string()]))
                        }
                        _ => None,
                    })
                    .collect(),
                &["FlattenStatementListsPass", "FusePass"],
            ),
            "GENERATE_TILE_STATEMENT" => after(
                self.get(PassTag::Tile)
                    .iter()
                    .flat_map(|d| match d {
                        PassDirective::Tile {
                            outer,
                            inner,
                            outer_len,
                            inner_len,
                        } => {
                            let (t1, t2) = (outer_len.to_string(), inner_len.to_string());
                            vec![
                                pass(&["TilePass", outer.as_str(), inner.as_str(), &t1, &t2]),
                                pass(&["UnrollConstantBoundsPass", t1.as_str()]),
                                pass(&["UnrollConstantBoundsPass", t2.as_str()]),
                            ]
                        }
                        _ => vec![],
                    })
                    .collect(),
                &["FusePass"],
            ),
            "GENERATE_SYSTOLIC_ARRAY_UNROLL_STATEMENT" => self
                .get(PassTag::SystolicArray)
                .iter()
                .filter_map(|d| match d {
                    PassDirective::SystolicArray { inner, size, .. } => {
                        Some(pass(&["UnrollPass", inner.as_str(), &size.to_string()]))
                    }
                    _ => None,
                })
                .collect(),
            "GENERATE_SYSTOLIC_ARRAY_INTERCHANGE_STATEMENT" => after(
                self.get(PassTag::SystolicArray)
                    .iter()
                    .filter_map(|d| match d {
                        PassDirective::SystolicArray { outer, inner, .. } => {
                            Some(pass(&["InterchangePass", inner.as_str(), outer.as_str()]))
                        }
                        _ => None,
                    })
                    .collect(),
                &["FusePass"],
            ),
            "GENERATE_SYSTOLIC_ARRAY_FEEDBACK_ELIMINATE_STATEMENT" => self
                .get(PassTag::SystolicArray)
                .iter()
                .map(|_| pass(&["SystolicArrayGenerationPass", "0"]))
                .collect(),
            _ => return None,
        };
        Some(lines)
    }
}

/// The pass-driver script optimizing `<prefix>.suif` with `passes`.
pub fn optimization_script(
    template: &Template,
    prefix: &str,
    passes: &PassBuckets,
) -> String {
    let subst = Substitutions::new().with("$1", prefix);
    template.expand(&subst, passes).join("\n")
}

/// The pass-driver script adding `module` from `<prefix>.suif` to the
/// library in `dir`.
pub fn module_script(prefix: &str, module: &str, dir: &str) -> String {
    let subst = Substitutions::new()
        .with("$1", prefix)
        .with("$2", module)
        .with("$3", dir);
    Template::new(ADD_MODULE_TEMPLATE)
        .expand(&subst, &crate::template::NoMarkers)
        .join("\n")
}
