//! Assembly language parser and disassembler.
//!
//! Converts human-readable assembly source into a [`Program`] and renders
//! programs back to text. Opcodes and operand layouts come from the
//! instruction table in [`isa`](crate::virtual_machine::isa).
//!
//! # Syntax
//!
//! ```text
//! label: mnemonic operand1, operand2, ...  # optional comment
//! ```
//!
//! - Mnemonics are case-insensitive (e.g., `set`, `JUMPZ`)
//! - Registers use `r` prefix (e.g., `r0`, `r7`)
//! - Immediates are decimal integers in `0..=65535`
//! - Jump targets are label names or `l<N>` for slot `N`
//! - `end` resolves to the end of the program unless defined explicitly
//! - Comments start with `#`
//! - Commas between operands are optional

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::operand::{Operand, OperandKind};
use crate::virtual_machine::program::{Program, SLOT_WIDTH, check_operand, decode_slot};
use std::collections::HashMap;
use std::fmt::Write;

const COMMENT_CHAR: char = '#';
const LABEL_SUFFIX: char = ':';
const END_LABEL: &str = "end";

/// Label table built during the first pass.
struct AsmContext {
    /// Label definitions mapping names to word offsets.
    labels: HashMap<String, usize>,
}

impl AsmContext {
    fn new() -> Self {
        Self {
            labels: HashMap::new(),
        }
    }

    /// Registers a label at the given word offset.
    fn define_label(&mut self, name: &str, offset: usize) -> Result<(), VMError> {
        if self.labels.contains_key(name) {
            return Err(VMError::DuplicateLabel(name.to_string()));
        }
        self.labels.insert(name.to_string(), offset);
        Ok(())
    }

    /// Resolves a label to its word offset.
    fn resolve_label(&self, name: &str) -> Result<usize, VMError> {
        self.labels
            .get(name)
            .copied()
            .ok_or_else(|| VMError::UndefinedLabel(name.to_string()))
    }
}

/// Tokenize a single line of assembly.
///
/// Rules:
/// - `#` starts a comment
/// - commas are ignored
/// - whitespace-separated tokens
fn tokenize(line: &str) -> Vec<&str> {
    let code = line.split(COMMENT_CHAR).next().unwrap_or("");
    code.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Checks if a token is a label definition (ends with `:`)
fn is_label_def(tok: &str) -> bool {
    tok.ends_with(LABEL_SUFFIX) && tok.len() > 1
}

/// Extracts the label name from a label definition token.
fn label_name(tok: &str) -> &str {
    &tok[..tok.len() - 1]
}

/// Parse a register token like `r0`, `r7`
fn parse_reg(tok: &str) -> Result<u16, VMError> {
    tok.strip_prefix('r')
        .and_then(|n| n.parse::<u16>().ok())
        .ok_or_else(|| VMError::ExpectedRegister(tok.to_string()))
}

/// Parse a 16-bit immediate
fn parse_imm(tok: &str) -> Result<u16, VMError> {
    tok.parse::<u16>()
        .map_err(|_| VMError::InvalidImmediate(tok.to_string()))
}

/// Parses `l<N>` as slot `N`, otherwise resolves `tok` as a label name.
fn parse_target(tok: &str, ctx: &AsmContext) -> Result<u16, VMError> {
    let offset = match tok.strip_prefix('l').map(str::parse::<usize>) {
        Some(Ok(slot)) => slot.checked_mul(SLOT_WIDTH),
        _ => Some(ctx.resolve_label(tok)?),
    };
    offset
        .and_then(|o| u16::try_from(o).ok())
        .ok_or_else(|| VMError::InvalidImmediate(tok.to_string()))
}

/// Parse one instruction at word offset `at` into its slot words.
fn parse_instruction(
    ctx: &AsmContext,
    tokens: &[&str],
    at: usize,
) -> Result<[u16; SLOT_WIDTH], VMError> {
    let instr = Instruction::from_mnemonic(tokens[0])
        .ok_or_else(|| VMError::InvalidInstructionName(tokens[0].to_string()))?;

    let kinds = instr.operands();
    if tokens.len() - 1 != kinds.len() {
        return Err(VMError::ArityMismatch {
            instruction: instr.mnemonic(),
            expected: kinds.len(),
            actual: tokens.len() - 1,
        });
    }

    let mut slot = [instr as u16, 0, 0, 0];
    for (i, kind) in kinds.iter().enumerate() {
        let tok = tokens[i + 1];
        let word = match kind {
            OperandKind::Reg => parse_reg(tok)?,
            OperandKind::Imm => parse_imm(tok)?,
            OperandKind::Target => parse_target(tok, ctx)?,
        };
        check_operand(*kind, word, at)?;
        slot[i + 1] = word;
    }
    Ok(slot)
}

/// Attaches a 1-based line number to an error.
fn at_line(line: usize) -> impl FnOnce(VMError) -> VMError {
    move |err| VMError::AssemblyError {
        line,
        source: err.to_string(),
    }
}

/// Performs two-pass assembly.
///
/// Pass 1: Tokenizes all lines and records label positions as word offsets.
///
/// Pass 2: Parses instructions with label resolution and emits slots.
pub fn assemble_source(source: &str) -> Result<Program, VMError> {
    let mut ctx = AsmContext::new();
    let mut lines: Vec<(usize, Vec<&str>)> = Vec::new();
    let mut offset = 0usize;

    for (line_no, line) in source.lines().enumerate() {
        let mut tokens = tokenize(line);
        if tokens.is_empty() {
            continue;
        }
        if is_label_def(tokens[0]) {
            ctx.define_label(label_name(tokens[0]), offset)
                .map_err(at_line(line_no + 1))?;
            tokens.remove(0);
            if tokens.is_empty() {
                continue;
            }
        }
        lines.push((line_no + 1, tokens));
        offset += SLOT_WIDTH;
    }
    ctx.labels.entry(END_LABEL.to_string()).or_insert(offset);

    let mut words = Vec::with_capacity(offset);
    for (i, (line, tokens)) in lines.iter().enumerate() {
        let slot = parse_instruction(&ctx, tokens, i * SLOT_WIDTH).map_err(at_line(*line))?;
        words.extend_from_slice(&slot);
    }

    Program::from_words(&words)
}

/// Renders `code[..length]` as assembly text, one `<slot>: <instruction>` per line.
///
/// The output assembles back into the same words.
pub fn disassemble(code: &[u16], length: usize) -> Result<String, VMError> {
    crate::virtual_machine::program::validate_code(code, length)?;

    let mut out = String::new();
    for at in (0..length).step_by(SLOT_WIDTH) {
        let instr = decode_slot(code, at)?;
        let _ = write!(out, "{}: {}", at / SLOT_WIDTH, instr.mnemonic());
        for (i, kind) in instr.operands().iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            let _ = write!(out, "{sep}{}", Operand::decode(*kind, code[at + 1 + i]));
        }
        out.push('\n');
    }
    Ok(out)
}
