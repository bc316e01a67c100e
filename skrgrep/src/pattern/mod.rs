/// This module turns a search key into a matcher and runs it over lines that may
/// be joined on demand, demonstrating how Rust's trait system replaces the
/// callback-based "give me the next line" hooks common in .NET text engines.
///
/// # Pattern Compilation
///
/// A [`SearchPattern`] is compiled once per grep invocation:
/// - literal keys are escaped, so `a.b` only matches the three characters `a.b`
/// - case-insensitive keys get an inline `(?i)` flag
/// - whole-word keys are wrapped in `\b` assertions
/// - the regex is built with multi-line and CRLF modes, so `^` and `$` see CR,
///   LF and CRLF as a single line break and `.` never crosses one
///
/// Every worker thread receives its own clone of the resulting [`Matcher`].
///
/// # Matching Across Lines
///
/// Lines are matched one at a time. When the key can consume line breaks (this
/// is read off the pattern's syntax tree), the matcher borrows following lines
/// through a [`LineCursor`] and hands back whatever the hit did not reach.
///
/// In .NET this is usually an event or delegate on the reader:
/// ```csharp
/// reader.NeedMoreText += (s, e) => e.Append(reader.ReadLine());
/// ```
///
/// In Rust, the matcher borrows the cursor mutably for the duration of one
/// attempt, so no other code can read lines while a match is being extended:
/// ```rust,ignore
/// let hit = matcher.find_across(&mut subject, start, &mut reader)?;
/// ```
///
/// # Zero-Width Hits
///
/// Keys such as `x*` match the empty string. The caller resumes one character
/// past an empty hit, so a scan over a line always terminates.
pub mod compiler;
pub mod cursor;
pub mod matcher;

pub use compiler::{ReplaceText, SearchPattern, MAX_CONTINUATION_LINES};
pub use cursor::{LineCursor, Subject, MAX_SUBJECT_LEN};
pub use matcher::{MatchRange, Matcher};
