//! Prompt contracts for the built-in template schemas.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the field list a prompt promises and the
//!    field list the registry advertises must stay in lockstep; keeping both
//!    in one module makes drift visible in review and testable in CI.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without
//!    calling a real vision model.
//!
//! Callers can override the chosen prompt via
//! [`crate::config::FillConfig::prompt_override`]; the constants here are
//! used only when no override is provided.
//!
//! Each contract ends with the same output discipline: return ONLY a JSON
//! array of flat objects with string values. The extractor tolerates models
//! that disobey (prose preamble, markdown fences), but a clean response
//! costs nothing to parse.

/// Prompt contract for the daily grinding report (one wide row set).
pub const GRINDING_PROMPT: &str = r#"You are an expert OCR model. Carefully extract every row from the handwritten DAILY GRINDING REPORT form in the image.

Follow these rules precisely:

1. FIELDS
   Each row has exactly these fields, in this order:
   "DATE", "SHIFT", "DIE NO", "NET WT.", "GRINDING QTY", "STATUS", "VENDOR"

2. COMPLETENESS
   - Extract every row exactly as it appears, top to bottom, left to right
   - Every row must include DATE and SHIFT, repeating them if the form does
   - Do not summarize, merge, or skip rows

3. LITERAL TRANSCRIPTION
   - Copy values exactly as written: keep dashes ("-"), spacing ("443-20"),
     and codes ("PLW", "SAARAMBHA") untouched
   - If a cell contains multiple parts (e.g. "OD", "(4462)"), keep all
     parts, comma-separated
   - Use "" for a blank cell, never null and never an invented value

4. OUTPUT FORMAT
   - Return ONLY a JSON array of objects, one object per row
   - Every value must be a JSON string
   - Do not wrap the array in markdown fences
   - Do not add commentary or explanations

Example shape:
[
  {"DATE": "25/07/25", "SHIFT": "I", "DIE NO": "5196", "NET WT.": "250", "GRINDING QTY": "", "STATUS": "", "VENDOR": ""}
]"#;

/// Prompt contract for the MPI production book (thirteen-column register).
pub const MPI_PROMPT: &str = r#"You are an expert OCR model. Carefully extract the structured table from the attached MPI Production Book image.

Follow these rules precisely:

1. FIELDS
   Each row has exactly these fields, in this order:
   "Date", "Shift", "Machine No.", "Operator Name", "Die No.", "RF. NO",
   "Heat Code", "Head Shot", "Coil Shot", "Total Qty. Checked", "OK",
   "Rework", "Remark"

2. COMPLETENESS
   - Extract every row, top to bottom
   - Repeat shared metadata (Date, Shift, Machine No., Operator Name)
     across all rows it applies to

3. LITERAL TRANSCRIPTION
   - If a field is blank or written as "-", preserve it exactly
   - Quantities stay as written ("07" stays "07", never 7)

4. OUTPUT FORMAT
   - Return ONLY a JSON array of objects, one object per row
   - Every value must be a JSON string
   - Do not wrap the array in markdown fences
   - Do not add commentary or explanations

Example shape:
[
  {"Date": "30/07/25", "Shift": "II", "Machine No.": "02", "Operator Name": "SHAMEBAZ", "Die No.": "4998", "RF. NO": "-", "Heat Code": "-", "Head Shot": "2500", "Coil Shot": "2800", "Total Qty. Checked": "81", "OK": "74", "Rework": "07", "Remark": "Fresh"}
]"#;

/// Prompt contract for the side-by-side die/quantity ledger.
///
/// Used for shot-blasting sheets and as the fallback for any template the
/// registry does not recognise: the two-column-pair layout is the house
/// default for these ledgers.
pub const PAIR_PROMPT: &str = r#"You are an expert OCR model. The image shows a handwritten table with two sets of columns side-by-side: a left "Die No"/"Qty" pair and a right "Die No"/"Qty" pair (the right side may contain RSB notes, machining remarks, or be blank).

Follow these rules precisely:

1. FIELDS
   Each row has exactly these fields, in this order:
   "Die No", "Qty", "Die No.1", "Qty.1"

2. COMPLETENESS
   - Extract ALL rows as they appear, row by row
   - Even if values are missing on one side, keep the empty cells so the
     output matches the visual structure
   - Do not skip rows or join cells

3. LITERAL TRANSCRIPTION
   - Remarks and notes go through verbatim, in any script
   - Use "" for a blank cell

4. OUTPUT FORMAT
   - Return ONLY a JSON array of objects, one object per row
   - Every value must be a JSON string
   - Do not wrap the array in markdown fences
   - Do not add commentary or explanations

Example shape:
[
  {"Die No": "5213", "Qty": "190", "Die No.1": "", "Qty.1": ""},
  {"Die No": "4209", "Qty": "169", "Die No.1": "RS:B", "Qty.1": ""}
]"#;
