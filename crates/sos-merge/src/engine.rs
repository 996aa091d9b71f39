//! Line-based merge with intra-line conflict refinement

use crate::eol::{eol_detect, join_lines, split_lines, Eol};
use anyhow::Result;
use similar::{capture_diff_slices, Algorithm, DiffOp, TextDiff};
use sos_core::Error;
use tracing::warn;

/// Which side of the diff to apply onto mine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeOperation {
    /// Apply theirs' insertions only; mine's extra lines are kept
    Insert,
    /// Apply theirs' deletions only; nothing new is inserted
    Remove,
    /// Apply both insertions and deletions
    #[default]
    Both,
}

/// How to settle a true conflict (both sides changed the same region)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictResolution {
    /// Keep mine's version
    #[default]
    Mine,
    /// Keep theirs' version
    Theirs,
    /// Delegate to the injected resolver
    Ask,
}

/// The answer a resolver gives for one conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSide {
    Mine,
    Theirs,
}

/// One conflicting region, handed to the resolver under `Ask`
#[derive(Debug)]
pub struct Conflict<'a> {
    /// Mine's lines in the conflicting block
    pub mine: Vec<&'a [u8]>,
    /// Theirs' lines in the conflicting block
    pub theirs: Vec<&'a [u8]>,
}

/// Interactive collaborator for `ConflictResolution::Ask`.
///
/// One call per conflict. Implementations range from a stdin prompt in the
/// CLI to a scripted double in tests.
pub trait ResolveConflict {
    fn choose(&mut self, conflict: &Conflict<'_>) -> Result<ConflictSide>;
}

/// A resolver that replays a fixed sequence of answers
#[derive(Debug, Default)]
pub struct ScriptedResolver {
    answers: Vec<ConflictSide>,
    next: usize,
}

impl ScriptedResolver {
    pub fn new(answers: Vec<ConflictSide>) -> Self {
        Self { answers, next: 0 }
    }
}

impl ResolveConflict for ScriptedResolver {
    fn choose(&mut self, _conflict: &Conflict<'_>) -> Result<ConflictSide> {
        match self.answers.get(self.next) {
            Some(side) => {
                self.next += 1;
                Ok(*side)
            }
            None => Err(Error::MergeConflictUnresolved.into()),
        }
    }
}

/// Merge `theirs` into `mine`.
///
/// Line-level alignment via an LCS sequence diff; equal blocks copy through,
/// insert/delete blocks follow `op`, replace blocks are conflicts settled by
/// `resolution` (after an intra-line refinement attempt when the two groups
/// have equal line counts). Output uses mine's end-of-line style; differing
/// styles produce a warning.
pub fn merge(
    mine: &[u8],
    theirs: &[u8],
    op: MergeOperation,
    resolution: ConflictResolution,
    mut resolver: Option<&mut (dyn ResolveConflict + '_)>,
) -> Result<Vec<u8>> {
    if mine == theirs {
        return Ok(mine.to_vec());
    }
    // Empty input: the other side's content wins outright.
    if mine.is_empty() {
        return Ok(theirs.to_vec());
    }
    if theirs.is_empty() {
        return Ok(mine.to_vec());
    }

    let eol_mine = eol_detect(mine);
    let eol_theirs = eol_detect(theirs);
    let out_eol = eol_mine.or(eol_theirs).unwrap_or(Eol::Lf);
    if let (Some(m), Some(t)) = (eol_mine, eol_theirs) {
        if m != t {
            warn!(?m, ?t, "mine and theirs use different end-of-line styles; coercing to mine's");
        }
    }

    let mine_lines = split_lines(mine, eol_mine.unwrap_or(out_eol));
    let theirs_lines = split_lines(theirs, eol_theirs.unwrap_or(out_eol));

    let diff = TextDiff::from_slices(&mine_lines, &theirs_lines);
    let mut out: Vec<&[u8]> = Vec::new();

    for diff_op in diff.ops() {
        match *diff_op {
            DiffOp::Equal { old_index, len, .. } => {
                out.extend_from_slice(&mine_lines[old_index..old_index + len]);
            }
            DiffOp::Insert {
                new_index, new_len, ..
            } => {
                // Lines only in theirs.
                if matches!(op, MergeOperation::Insert | MergeOperation::Both) {
                    out.extend_from_slice(&theirs_lines[new_index..new_index + new_len]);
                }
            }
            DiffOp::Delete {
                old_index, old_len, ..
            } => {
                // Lines only in mine: removed under Remove/Both, kept otherwise.
                if !matches!(op, MergeOperation::Remove | MergeOperation::Both) {
                    out.extend_from_slice(&mine_lines[old_index..old_index + old_len]);
                }
            }
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                let mine_block = &mine_lines[old_index..old_index + old_len];
                let theirs_block = &theirs_lines[new_index..new_index + new_len];
                merge_replace_block(
                    mine_block,
                    theirs_block,
                    op,
                    resolution,
                    &mut resolver,
                    &mut out,
                )?;
            }
        }
    }

    Ok(join_lines(&out, out_eol))
}

/// Handle one replace block (lines differ on both sides).
fn merge_replace_block<'a>(
    mine_block: &[&'a [u8]],
    theirs_block: &[&'a [u8]],
    op: MergeOperation,
    resolution: ConflictResolution,
    resolver: &mut Option<&mut (dyn ResolveConflict + '_)>,
    out: &mut Vec<&'a [u8]>,
) -> Result<()> {
    match op {
        // Insertion-only: keep mine's lines, then bring in theirs'.
        MergeOperation::Insert => {
            out.extend_from_slice(mine_block);
            out.extend_from_slice(theirs_block);
        }
        // Removal-only: mine's lines go, nothing comes in.
        MergeOperation::Remove => {}
        MergeOperation::Both => {
            if mine_block.len() == theirs_block.len() {
                // Equal group sizes: refine per aligned line pair.
                for (&mine_line, &theirs_line) in mine_block.iter().zip(theirs_block.iter()) {
                    match submerge_line(mine_line, theirs_line) {
                        Some(winner) => out.push(winner),
                        None => {
                            let side =
                                settle(resolution, resolver, &[mine_line], &[theirs_line])?;
                            out.push(match side {
                                ConflictSide::Mine => mine_line,
                                ConflictSide::Theirs => theirs_line,
                            });
                        }
                    }
                }
            } else {
                // Unequal sizes: whole-block conflict, no intra-line attempt.
                let side = settle(resolution, resolver, mine_block, theirs_block)?;
                match side {
                    ConflictSide::Mine => out.extend_from_slice(mine_block),
                    ConflictSide::Theirs => out.extend_from_slice(theirs_block),
                }
            }
        }
    }
    Ok(())
}

/// Character-level refinement of one aligned line pair.
///
/// If theirs is mine plus insertions, theirs changed the line: take theirs.
/// If mine is theirs plus insertions, mine changed it: take mine. Anything
/// else means both sides rewrote the same region - a true conflict (None).
fn submerge_line<'a>(mine: &'a [u8], theirs: &'a [u8]) -> Option<&'a [u8]> {
    if mine == theirs {
        return Some(mine);
    }

    // Byte-level diff of the two lines.
    let ops = capture_diff_slices(Algorithm::Myers, mine, theirs);
    let mut has_insert = false;
    let mut has_delete = false;
    for op in &ops {
        match op {
            DiffOp::Equal { .. } => {}
            DiffOp::Insert { .. } => has_insert = true,
            DiffOp::Delete { .. } => has_delete = true,
            DiffOp::Replace { .. } => return None,
        }
    }

    match (has_insert, has_delete) {
        (true, false) => Some(theirs),
        (false, true) => Some(mine),
        _ => None,
    }
}

fn settle(
    resolution: ConflictResolution,
    resolver: &mut Option<&mut (dyn ResolveConflict + '_)>,
    mine: &[&[u8]],
    theirs: &[&[u8]],
) -> Result<ConflictSide> {
    match resolution {
        ConflictResolution::Mine => Ok(ConflictSide::Mine),
        ConflictResolution::Theirs => Ok(ConflictSide::Theirs),
        ConflictResolution::Ask => {
            let conflict = Conflict {
                mine: mine.to_vec(),
                theirs: theirs.to_vec(),
            };
            match resolver {
                Some(r) => r.choose(&conflict),
                None => Err(Error::MergeConflictUnresolved.into()),
            }
        }
    }
}
