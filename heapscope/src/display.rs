use crate::analysis::heap::analysis::{HeapAnalysisResult, JoinPoint};
use crate::analysis::heap::domain::Domain;
use heapscope_il::{IlDisplay, MethodBody, ProgramPoint};
use std::fmt::{Display, Formatter};

/// How much of each state a [`Listing`] prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Detail {
    /// Only the state on entry of each block
    #[default]
    Blocks,
    /// The state after every instruction as well
    Instructions,
}

/// A method body interleaved with the states the analysis computed for it.
pub struct Listing<'a> {
    result: &'a HeapAnalysisResult,
    body: &'a MethodBody,
    detail: Detail,
}

impl HeapAnalysisResult {
    pub fn listing<'a>(&'a self, body: &'a MethodBody, detail: Detail) -> Listing<'a> {
        Listing {
            result: self,
            body,
            detail,
        }
    }
}

fn write_indented(f: &mut Formatter<'_>, d: &Domain, indent: &str) -> std::fmt::Result {
    for line in d.to_string().lines() {
        writeln!(f, "{indent}{line}")?;
    }
    Ok(())
}

impl Display for Listing<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let entry = self.result.entry_state();
        let md = entry.ctx().metadata();
        writeln!(f, "method {}", self.result.method().display(md))?;
        for id in self.body.block_ids() {
            writeln!(f, "{id}:")?;
            let Some(state) = self.result.block_entry(id) else {
                writeln!(f, "    unreachable")?;
                continue;
            };
            if let JoinPoint::Resolved { incoming, .. } = self.result.join_point(id) {
                writeln!(f, "    ; joined, last from edge {incoming}")?;
            }
            write_indented(f, state, "    | ")?;
            let Some(block) = self.body.block(id) else {
                continue;
            };
            for (index, instruction) in block.instructions.iter().enumerate() {
                writeln!(f, "  {index:>3}: {}", instruction.display(md))?;
                if self.detail == Detail::Instructions
                    && let Some(post) = self
                        .result
                        .post_state(ProgramPoint::new(id, index))
                {
                    write_indented(f, post, "    | ")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::heap::test_support::{Fixture, body};
    use heapscope_il::{Instruction, Parameter, Temp};

    #[test]
    fn test_listing_shows_blocks_and_instructions() {
        let mut fx = Fixture::new();
        let m = fx.static_method("Echo", vec![fx.node], Some(fx.node), vec![]);
        let b = body(
            m,
            vec![vec![
                Instruction::Ldarg {
                    param: Parameter(0),
                    dest: Temp(0),
                },
                Instruction::Return {
                    source: Some(Temp(0)),
                },
            ]],
            vec![],
        );
        let result = fx.analyze(&b);
        let text = result.listing(&b, Detail::Instructions).to_string();
        assert!(text.starts_with("method Test.Node::Echo\n"));
        assert!(text.contains("b0:\n"));
        assert!(text.contains("s0 = arg0"));
        assert!(text.contains("ret s0"));
        assert!(text.contains("| arg0 = "));
    }
}
