//! Focus-session ingestion and task-hierarchy resolution.
//! Raw focus-session exports go in; a ledger of sessions, a task tree and their aggregates come out.
//! The core stays pure: file access lives behind the `storage` seam and the CLI.

pub mod core {
    use chrono::NaiveDateTime;
    use indexmap::IndexMap;
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use uuid::Uuid;

    /* ------------------------------- IDs ------------------------------- */

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct SessionId(pub Uuid);

    impl SessionId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    /// Position of a task node inside the registry arena.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct NodeId(pub usize);

    /* ------------------------------ Raw input ------------------------------ */

    /// One exported record, exactly as read. Never mutated after construction.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RawSession {
        /// Composite duration token such as `"3h45m0s"`.
        pub duration: String,

        /// Task the session was focused on.
        pub task_title: String,

        /// Tasks closed during the session, bare names or name/parent pairs.
        #[serde(default)]
        pub completed_tasks: Vec<CompletedTask>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub note: Option<String>,
    }

    impl RawSession {
        pub fn new(duration: impl Into<String>, task_title: impl Into<String>) -> Self {
            Self {
                duration: duration.into(),
                task_title: task_title.into(),
                completed_tasks: vec![],
                note: None,
            }
        }

        pub fn with_completed(mut self, entry: CompletedTask) -> Self {
            self.completed_tasks.push(entry);
            self
        }

        pub fn with_note(mut self, note: impl Into<String>) -> Self {
            self.note = Some(note.into());
            self
        }
    }

    /// A `completedTasks` entry in either of its two export shapes.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(untagged)]
    pub enum CompletedTask {
        Bare(String),
        Pair {
            #[serde(rename = "taskName")]
            task_name: String,
            /// `Some("")` marks an explicit top-level item; a missing field behaves like a bare entry.
            #[serde(
                rename = "parentTaskName",
                default,
                skip_serializing_if = "Option::is_none"
            )]
            parent_task_name: Option<String>,
        },
    }

    impl CompletedTask {
        pub fn bare(name: impl Into<String>) -> Self {
            Self::Bare(name.into())
        }

        pub fn pair(name: impl Into<String>, parent: impl Into<String>) -> Self {
            Self::Pair {
                task_name: name.into(),
                parent_task_name: Some(parent.into()),
            }
        }
    }

    /// One source collection (typically one exported file) for a single category.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RecordSet {
        /// Identifier of the collection, used when reporting collisions.
        pub source: String,
        /// Category label the collection is merged under ("Books", "LEGO", ...).
        pub category: String,
        /// Timestamp key → records listed under it, in export order.
        #[serde(default)]
        pub entries: IndexMap<String, Vec<RawSession>>,
        /// Problems found while reading the collection: unreadable records, repeated keys.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub load_diagnostics: Vec<Diagnostic>,
    }

    impl RecordSet {
        pub fn new(source: impl Into<String>, category: impl Into<String>) -> Self {
            Self {
                source: source.into(),
                category: category.into(),
                entries: IndexMap::new(),
                load_diagnostics: vec![],
            }
        }

        pub fn push(&mut self, key: impl Into<String>, raw: RawSession) -> &mut Self {
            self.entries.entry(key.into()).or_default().push(raw);
            self
        }

        pub fn record_count(&self) -> usize {
            self.entries.values().map(Vec::len).sum()
        }
    }

    /// Points back at the raw record a session or diagnostic came from.
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RecordRef {
        pub source: String,
        pub category: String,
        pub key: String,
        /// Position inside the key's list.
        pub index: usize,
    }

    impl fmt::Display for RecordRef {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "{}/{} [{}] #{}",
                self.source, self.category, self.key, self.index
            )
        }
    }

    /* ------------------------------ Task tree ------------------------------ */

    /// Where a node hangs. `Unknown` moves to `Root` or `Child` at most once; both are terminal.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum ParentState {
        Unknown,
        Root,
        Child(NodeId),
    }

    /// A uniquely named task: a book, a chapter, a build stage, an activity.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TaskNode {
        pub id: NodeId,
        /// Natural key; matched exactly (case and whitespace sensitive).
        pub name: String,
        pub parent: ParentState,

        /// Back-references kept in step with `parent`; derived, never authoritative.
        #[serde(default)]
        pub children: Vec<NodeId>,

        /// Seconds of sessions whose title is this node.
        pub total_duration_seconds: u64,

        /// Number of sessions that listed this node as completed.
        pub completion_count: u32,

        /// End of the earliest session that completed this node.
        pub first_completed_at: Option<NaiveDateTime>,

        /// End of the latest session that completed this node.
        pub last_completed_at: Option<NaiveDateTime>,
    }

    impl TaskNode {
        pub fn new(id: NodeId, name: impl Into<String>) -> Self {
            Self {
                id,
                name: name.into(),
                parent: ParentState::Unknown,
                children: vec![],
                total_duration_seconds: 0,
                completion_count: 0,
                first_completed_at: None,
                last_completed_at: None,
            }
        }

        pub fn is_anchored(&self) -> bool {
            !matches!(self.parent, ParentState::Unknown)
        }
    }

    /* ------------------------------- Ledger ------------------------------- */

    /// One ingested session. Owned by the ledger and immutable once stored.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Session {
        pub id: SessionId,
        pub origin: RecordRef,

        /// Parsed timestamp key; drives ordering and daily totals.
        pub instant: NaiveDateTime,

        /// Scheduled span. Sessions sharing a key run back to back starting at `instant`.
        pub start: NaiveDateTime,
        pub end: NaiveDateTime,

        pub duration_seconds: u64,
        pub task_title: NodeId,

        /// Nodes completed in this session, in listing order, without repeats.
        #[serde(default)]
        pub completed: Vec<NodeId>,

        pub note: Option<String>,
    }

    impl Session {
        pub fn category(&self) -> &str {
            &self.origin.category
        }
    }

    /* ---------------------------- Errors (domain) ---------------------------- */

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    pub enum ParseError {
        #[error("malformed duration {raw:?}: {reason}")]
        MalformedDuration { raw: String, reason: String },
        #[error("malformed timestamp {raw:?}: {reason}")]
        MalformedTimestamp { raw: String, reason: String },
    }

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    pub enum MergeError {
        #[error(
            "timestamp key {key:?} in category {category:?} is supplied by both {first_source:?} and {second_source:?}"
        )]
        DuplicateTimestampKey {
            key: String,
            category: String,
            first_source: String,
            second_source: String,
        },
    }

    /// Parent claimed for a node, as reported in diagnostics.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "kind", content = "name", rename_all = "snake_case")]
    pub enum ParentClaim {
        Root,
        Named(String),
    }

    impl fmt::Display for ParentClaim {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                ParentClaim::Root => f.write_str("<root>"),
                ParentClaim::Named(name) => write!(f, "{name:?}"),
            }
        }
    }

    /// Ingestion-time observation. Accumulated by the ledger, never thrown per record.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    pub enum Diagnostic {
        #[error("{record}: malformed duration {raw:?} ({reason}); record skipped")]
        MalformedDuration {
            record: RecordRef,
            raw: String,
            reason: String,
        },
        #[error("{record}: malformed timestamp {raw:?} ({reason}); record skipped")]
        MalformedTimestamp {
            record: RecordRef,
            raw: String,
            reason: String,
        },
        #[error("{record}: {child:?} is already under {current}, ignoring {proposed}")]
        ParentConflict {
            record: RecordRef,
            child: String,
            current: ParentClaim,
            proposed: ParentClaim,
        },
        #[error("{record}: unreadable record ({reason}); record skipped")]
        MalformedRecord { record: RecordRef, reason: String },
        #[error("{record}: placing {child:?} under {parent:?} would create a cycle")]
        CycleDetected {
            record: RecordRef,
            child: String,
            parent: String,
        },
        #[error("key {key:?} supplied by {sources:?} (categories {categories:?}); sessions kept side by side")]
        DuplicateTimestampKey {
            key: String,
            categories: Vec<String>,
            sources: Vec<String>,
        },
    }

    impl Diagnostic {
        pub fn from_parse_error(record: RecordRef, err: ParseError) -> Self {
            match err {
                ParseError::MalformedDuration { raw, reason } => Diagnostic::MalformedDuration {
                    record,
                    raw,
                    reason,
                },
                ParseError::MalformedTimestamp { raw, reason } => Diagnostic::MalformedTimestamp {
                    record,
                    raw,
                    reason,
                },
            }
        }

        /// Raw-record field the observation is about.
        pub fn field(&self) -> &'static str {
            match self {
                Diagnostic::MalformedDuration { .. } => "duration",
                Diagnostic::MalformedRecord { .. } => "record",
                Diagnostic::MalformedTimestamp { .. } | Diagnostic::DuplicateTimestampKey { .. } => {
                    "timestampKey"
                }
                Diagnostic::ParentConflict { .. } | Diagnostic::CycleDetected { .. } => {
                    "completedTasks"
                }
            }
        }

        pub fn record(&self) -> Option<&RecordRef> {
            match self {
                Diagnostic::MalformedDuration { record, .. }
                | Diagnostic::MalformedTimestamp { record, .. }
                | Diagnostic::MalformedRecord { record, .. }
                | Diagnostic::ParentConflict { record, .. }
                | Diagnostic::CycleDetected { record, .. } => Some(record),
                Diagnostic::DuplicateTimestampKey { .. } => None,
            }
        }
    }
}

pub mod parser {
    //! `nom` grammars for the two free-text fields of a raw record.
    //!
    //! - Durations: optional `<int>h`, `<int>m`, `<int>s` segments in that order. Minutes and
    //!   seconds may exceed 59; nothing carries between units.
    //! - Timestamp keys: `Mon D, YYYY - H:MMAM`, read as naive local time.

    use crate::core::ParseError;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use nom::{
        IResult,
        branch::alt,
        bytes::complete::{tag, tag_no_case, take_while},
        character::complete::{char, digit1, space1},
        combinator::{map_res, opt, value},
        error::{VerboseError, VerboseErrorKind},
        sequence::{terminated, tuple},
    };

    type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

    /* ------------------------------ Durations ------------------------------ */

    /// Parse a duration token such as `"3h45m0s"` into whole seconds.
    pub fn parse_duration(token: &str) -> Result<u64, ParseError> {
        let malformed = |reason: String| ParseError::MalformedDuration {
            raw: token.to_string(),
            reason,
        };

        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(malformed("empty token".into()));
        }

        let (rest, (hours, minutes, seconds)) =
            duration_segments(trimmed).map_err(|e| malformed(describe(e)))?;
        if !rest.is_empty() {
            return Err(malformed(format!(
                "unrecognized segment {rest:?}; expected <int>h, <int>m, <int>s in that order"
            )));
        }

        hours
            .unwrap_or(0)
            .checked_mul(3600)
            .zip(minutes.unwrap_or(0).checked_mul(60))
            .and_then(|(h, m)| h.checked_add(m))
            .and_then(|hm| hm.checked_add(seconds.unwrap_or(0)))
            .ok_or_else(|| malformed("duration overflows".into()))
    }

    /// Canonical rendering: `"3h45m0s"`, or `"17m40s"` when there are no whole hours.
    pub fn format_duration(seconds: u64) -> String {
        let (h, m, s) = (seconds / 3600, seconds % 3600 / 60, seconds % 60);
        if h > 0 {
            format!("{h}h{m}m{s}s")
        } else {
            format!("{m}m{s}s")
        }
    }

    fn duration_segments(i: &str) -> PResult<'_, (Option<u64>, Option<u64>, Option<u64>)> {
        tuple((opt(segment('h')), opt(segment('m')), opt(segment('s'))))(i)
    }

    fn segment<'a>(unit: char) -> impl FnMut(&'a str) -> PResult<'a, u64> {
        terminated(map_res(digit1, |s: &str| s.parse::<u64>()), char(unit))
    }

    /* ----------------------------- Timestamps ----------------------------- */

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Meridiem {
        Am,
        Pm,
    }

    struct KeyParts {
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        meridiem: Meridiem,
    }

    /// Parse a key such as `"Feb 19, 2024 - 10:30PM"` into a naive instant.
    pub fn parse_timestamp_key(key: &str) -> Result<NaiveDateTime, ParseError> {
        let malformed = |reason: String| ParseError::MalformedTimestamp {
            raw: key.to_string(),
            reason,
        };

        let (rest, parts) = timestamp_key(key.trim()).map_err(|e| malformed(describe(e)))?;
        if !rest.is_empty() {
            return Err(malformed(format!("trailing input {rest:?}")));
        }

        let KeyParts {
            year,
            month,
            day,
            hour,
            minute,
            meridiem,
        } = parts;

        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| malformed(format!("no such date {year}-{month:02}-{day:02}")))?;
        if !(1..=12).contains(&hour) {
            return Err(malformed(format!("hour {hour} is outside 1..=12")));
        }
        let hour24 = match (meridiem, hour) {
            (Meridiem::Am, 12) => 0,
            (Meridiem::Am, h) => h,
            (Meridiem::Pm, 12) => 12,
            (Meridiem::Pm, h) => h + 12,
        };
        let time = NaiveTime::from_hms_opt(hour24, minute, 0)
            .ok_or_else(|| malformed(format!("minute {minute} is outside 0..=59")))?;

        Ok(date.and_time(time))
    }

    /// Render an instant back into key form (`"Jan 1, 2024 - 5:00AM"`).
    pub fn format_timestamp_key(instant: NaiveDateTime) -> String {
        instant.format("%b %-d, %Y - %-I:%M%p").to_string()
    }

    fn timestamp_key(i: &str) -> PResult<'_, KeyParts> {
        // Jan 1, 2024 - 5:00AM
        let (i, month) = month_abbrev(i)?;
        let (i, _) = space1(i)?;
        let (i, day) = number(1, 2)(i)?;
        let (i, _) = char(',')(i)?;
        let (i, _) = space1(i)?;
        let (i, year) = map_res(take_while_m_n(4, 4, char_is_digit), |s: &str| {
            s.parse::<i32>()
        })(i)?;
        let (i, _) = tuple((space1, char('-'), space1))(i)?;
        let (i, hour) = number(1, 2)(i)?;
        let (i, _) = char(':')(i)?;
        let (i, minute) = number(2, 2)(i)?;
        let (i, meridiem) = alt((
            value(Meridiem::Am, tag_no_case("AM")),
            value(Meridiem::Pm, tag_no_case("PM")),
        ))(i)?;

        Ok((
            i,
            KeyParts {
                year,
                month,
                day,
                hour,
                minute,
                meridiem,
            },
        ))
    }

    fn month_abbrev(i: &str) -> PResult<'_, u32> {
        alt((
            value(1u32, tag("Jan")),
            value(2, tag("Feb")),
            value(3, tag("Mar")),
            value(4, tag("Apr")),
            value(5, tag("May")),
            value(6, tag("Jun")),
            value(7, tag("Jul")),
            value(8, tag("Aug")),
            value(9, tag("Sep")),
            value(10, tag("Oct")),
            value(11, tag("Nov")),
            value(12, tag("Dec")),
        ))(i)
    }

    fn number(m: usize, n: usize) -> impl Fn(&str) -> PResult<'_, u32> {
        move |i: &str| map_res(take_while_m_n(m, n, char_is_digit), |s: &str| s.parse::<u32>())(i)
    }

    fn take_while_m_n<F>(m: usize, n: usize, cond: F) -> impl Fn(&str) -> PResult<'_, &str>
    where
        F: Fn(char) -> bool + Copy,
    {
        move |i: &str| {
            let (i, out) = take_while(cond)(i)?;
            if out.len() < m || out.len() > n {
                Err(nom::Err::Error(VerboseError {
                    errors: vec![(i, VerboseErrorKind::Context("m_n"))],
                }))
            } else {
                Ok((i, out))
            }
        }
    }

    fn char_is_digit(c: char) -> bool {
        c.is_ascii_digit()
    }

    fn describe(e: nom::Err<VerboseError<&str>>) -> String {
        match e {
            nom::Err::Error(ve) | nom::Err::Failure(ve) => match ve.errors.first() {
                Some((frag, kind)) => {
                    let show = frag.get(0..frag.len().min(24)).unwrap_or(frag);
                    format!("unexpected input at {show:?} ({kind:?})")
                }
                None => "unrecognized input".to_string(),
            },
            nom::Err::Incomplete(_) => "incomplete input".to_string(),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::{format_duration, format_timestamp_key, parse_duration, parse_timestamp_key};
        use crate::core::ParseError;
        use chrono::{NaiveDate, Timelike};

        #[test]
        fn durations_sum_segments_without_carry() {
            assert_eq!(parse_duration("3h45m0s").unwrap(), 13500);
            assert_eq!(parse_duration("17m40s").unwrap(), 1060);
            assert_eq!(parse_duration("06m44s").unwrap(), 404);
            assert_eq!(parse_duration("179m50s").unwrap(), 10790);
            assert_eq!(parse_duration("2h").unwrap(), 7200);
            assert_eq!(parse_duration("45s").unwrap(), 45);
            assert_eq!(parse_duration(" 5m ").unwrap(), 300);
        }

        #[test]
        fn canonical_format_reparses_to_same_seconds() {
            for secs in [0, 59, 404, 1060, 3600, 10790, 13500, 86_399] {
                let text = format_duration(secs);
                assert_eq!(parse_duration(&text).unwrap(), secs, "via {text}");
            }
            assert_eq!(format_duration(13500), "3h45m0s");
            assert_eq!(format_duration(1060), "17m40s");
        }

        #[test]
        fn durations_reject_disorder_and_junk() {
            for bad in ["", "40s17m", "1h2h", "5x", "m30s", "1.5h", "12", "3h 45m"] {
                match parse_duration(bad) {
                    Err(ParseError::MalformedDuration { raw, .. }) => assert_eq!(raw, bad),
                    other => panic!("expected malformed duration for {bad:?}, got {other:?}"),
                }
            }
        }

        #[test]
        fn duration_overflow_is_malformed() {
            let huge = format!("{}h", u64::MAX);
            assert!(matches!(
                parse_duration(&huge),
                Err(ParseError::MalformedDuration { .. })
            ));
        }

        #[test]
        fn timestamp_keys_parse_to_naive_instants() {
            let a = parse_timestamp_key("Jan 1, 2024 - 5:00AM").unwrap();
            let b = parse_timestamp_key("Jan 1, 2024 - 5:00AM").unwrap();
            assert_eq!(a, b);
            assert_eq!(
                a,
                NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(5, 0, 0)
                    .unwrap()
            );

            let later = parse_timestamp_key("Feb 19, 2024 - 10:30PM").unwrap();
            let earlier = parse_timestamp_key("Feb 18, 2024 - 10:30PM").unwrap();
            assert!(later > earlier);
            assert_eq!(later.hour(), 22);
        }

        #[test]
        fn twelve_oclock_edges() {
            assert_eq!(
                parse_timestamp_key("Jun 23, 2025 - 12:08PM")
                    .unwrap()
                    .hour(),
                12
            );
            assert_eq!(
                parse_timestamp_key("Jun 23, 2025 - 12:08am")
                    .unwrap()
                    .hour(),
                0
            );
        }

        #[test]
        fn timestamp_keys_reject_other_shapes() {
            for bad in [
                "2024-01-01 05:00",
                "Jan 1 2024 - 5:00AM",
                "January 1, 2024 - 5:00AM",
                "Feb 30, 2024 - 5:00AM",
                "Jan 1, 2024 - 13:00PM",
                "Jan 1, 2024 - 5:61AM",
                "Jan 1, 2024 - 5:00",
                "Jan 1, 2024 - 5:00AM extra",
            ] {
                assert!(
                    matches!(
                        parse_timestamp_key(bad),
                        Err(ParseError::MalformedTimestamp { .. })
                    ),
                    "{bad:?} should be rejected"
                );
            }
        }

        #[test]
        fn key_format_round_trips() {
            for key in ["Jan 1, 2024 - 5:00AM", "Jun 23, 2025 - 12:08PM", "Dec 31, 2025 - 11:59PM"] {
                let instant = parse_timestamp_key(key).unwrap();
                assert_eq!(format_timestamp_key(instant), key);
            }
        }
    }
}

pub mod normalize {
    //! Turns the two `completedTasks` shapes into one edge form at the ingestion boundary.

    use crate::core::{CompletedTask, RawSession};
    use serde::{Deserialize, Serialize};

    /// Which input shape produced an edge.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum EdgeOrigin {
        /// A bare name; its parent is implied by the session title.
        Bare,
        /// A `{taskName, parentTaskName}` pair.
        Explicit,
    }

    /// Child → parent relation extracted from one completed-task entry.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct NormalizedEdge {
        pub child: String,
        pub parent: Option<String>,
        pub origin: EdgeOrigin,
    }

    impl NormalizedEdge {
        /// An explicit pair with an empty parent marks the child top-level.
        /// A bare self-reference carries no parent information at all.
        pub fn asserts_root(&self) -> bool {
            self.parent.is_none() && self.origin == EdgeOrigin::Explicit
        }
    }

    pub fn normalize_completions(raw: &RawSession) -> Vec<NormalizedEdge> {
        raw.completed_tasks
            .iter()
            .map(|entry| normalize_entry(&raw.task_title, entry))
            .collect()
    }

    fn normalize_entry(title: &str, entry: &CompletedTask) -> NormalizedEdge {
        match entry {
            CompletedTask::Bare(name)
            | CompletedTask::Pair {
                task_name: name,
                parent_task_name: None,
            } => NormalizedEdge {
                child: name.clone(),
                parent: (name != title).then(|| title.to_string()),
                origin: EdgeOrigin::Bare,
            },
            CompletedTask::Pair {
                task_name,
                parent_task_name: Some(parent),
            } => NormalizedEdge {
                child: task_name.clone(),
                parent: (!parent.is_empty()).then(|| parent.clone()),
                origin: EdgeOrigin::Explicit,
            },
        }
    }

    #[cfg(test)]
    mod tests {
        use super::{EdgeOrigin, NormalizedEdge, normalize_completions};
        use crate::core::{CompletedTask, RawSession};

        fn edge(child: &str, parent: Option<&str>, origin: EdgeOrigin) -> NormalizedEdge {
            NormalizedEdge {
                child: child.into(),
                parent: parent.map(str::to_string),
                origin,
            }
        }

        #[test]
        fn empty_completions_produce_no_edges() {
            let raw = RawSession::new("32m18s", "Walking");
            assert!(normalize_completions(&raw).is_empty());
        }

        #[test]
        fn bare_entries_hang_under_the_title_except_itself() {
            let raw = RawSession::new("18m50s", "Chapter 3")
                .with_completed(CompletedTask::bare("Chapter 3"))
                .with_completed(CompletedTask::bare("Part One"));
            let edges = normalize_completions(&raw);
            assert_eq!(
                edges,
                vec![
                    edge("Chapter 3", None, EdgeOrigin::Bare),
                    edge("Part One", Some("Chapter 3"), EdgeOrigin::Bare),
                ]
            );
            assert!(!edges[0].asserts_root());
        }

        #[test]
        fn pairs_keep_their_parent_and_empty_means_root() {
            let raw = RawSession::new("1h59m0s", "7. CAR REAR")
                .with_completed(CompletedTask::pair("7. CAR REAR", "Ferrari"))
                .with_completed(CompletedTask::pair("Ferrari", ""));
            let edges = normalize_completions(&raw);
            assert_eq!(edges[0], edge("7. CAR REAR", Some("Ferrari"), EdgeOrigin::Explicit));
            assert_eq!(edges[1], edge("Ferrari", None, EdgeOrigin::Explicit));
            assert!(edges[1].asserts_root());
        }

        #[test]
        fn mixed_entries_deserialize_from_export_json() {
            let raw: RawSession = serde_json::from_str(
                r#"{
                    "duration": "2h45m0s",
                    "taskTitle": "Falcon",
                    "completedTasks": [
                        "Sticker sheet",
                        { "taskName": "Bag 1", "parentTaskName": "Falcon" },
                        { "taskName": "Bag 2" }
                    ]
                }"#,
            )
            .unwrap();
            assert!(raw.note.is_none());
            let edges = normalize_completions(&raw);
            assert_eq!(
                edges,
                vec![
                    edge("Sticker sheet", Some("Falcon"), EdgeOrigin::Bare),
                    edge("Bag 1", Some("Falcon"), EdgeOrigin::Explicit),
                    edge("Bag 2", Some("Falcon"), EdgeOrigin::Bare),
                ]
            );
        }
    }
}

pub mod hierarchy {
    //! Shared task registry: an arena of nodes addressed by `NodeId` and looked up by name.
    //!
    //! Parent assignment is first-write-wins. A node's parent moves from `Unknown` to `Root` or to
    //! a named node once; later disagreeing claims are reported, never applied.

    use crate::core::{Diagnostic, NodeId, ParentClaim, ParentState, RecordRef, TaskNode};
    use crate::normalize::NormalizedEdge;
    use indexmap::IndexMap;
    use tracing::debug;

    /// What applying one edge did to the tree.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum EdgeOutcome {
        Anchored,
        MarkedRoot,
        Unchanged,
        Conflict,
        Cycle,
    }

    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct TaskRegistry {
        nodes: IndexMap<String, TaskNode>,
    }

    impl TaskRegistry {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn len(&self) -> usize {
            self.nodes.len()
        }

        pub fn is_empty(&self) -> bool {
            self.nodes.is_empty()
        }

        /// Look up `name`, creating an `Unknown`-parent placeholder on first mention.
        pub fn ensure(&mut self, name: &str) -> NodeId {
            if let Some(idx) = self.nodes.get_index_of(name) {
                return NodeId(idx);
            }
            let id = NodeId(self.nodes.len());
            self.nodes.insert(name.to_string(), TaskNode::new(id, name));
            id
        }

        pub fn id_of(&self, name: &str) -> Option<NodeId> {
            self.nodes.get_index_of(name).map(NodeId)
        }

        pub fn get(&self, id: NodeId) -> Option<&TaskNode> {
            self.nodes.get_index(id.0).map(|(_, node)| node)
        }

        pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut TaskNode> {
            self.nodes.get_index_mut(id.0).map(|(_, node)| node)
        }

        pub fn by_name(&self, name: &str) -> Option<&TaskNode> {
            self.nodes.get(name)
        }

        pub fn name_of(&self, id: NodeId) -> &str {
            self.get(id).map(|n| n.name.as_str()).unwrap_or_default()
        }

        /// Nodes in first-mention order.
        pub fn iter(&self) -> impl Iterator<Item = &TaskNode> {
            self.nodes.values()
        }

        /// Nodes with no known parent: explicit roots and still-unanchored placeholders.
        pub fn top_level(&self) -> impl Iterator<Item = &TaskNode> {
            self.iter()
                .filter(|n| !matches!(n.parent, ParentState::Child(_)))
        }

        /// Parent chain from the immediate parent upwards.
        pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
            let mut out = Vec::new();
            let mut cursor = self.get(id).map(|n| n.parent);
            while let Some(ParentState::Child(parent)) = cursor {
                if out.len() > self.nodes.len() || out.contains(&parent) {
                    break;
                }
                out.push(parent);
                cursor = self.get(parent).map(|n| n.parent);
            }
            out
        }

        /// Breadcrumb names from the top-most known ancestor down to `id`.
        pub fn path_of(&self, id: NodeId) -> Vec<&str> {
            let mut path: Vec<&str> = self
                .ancestors(id)
                .into_iter()
                .rev()
                .map(|a| self.name_of(a))
                .collect();
            path.push(self.name_of(id));
            path
        }

        /// `id` followed by every transitive descendant, depth-first.
        pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
            let mut seen = vec![false; self.nodes.len()];
            let mut out = Vec::new();
            let mut stack = vec![id];
            while let Some(next) = stack.pop() {
                let Some(node) = self.get(next) else { continue };
                if std::mem::replace(&mut seen[next.0], true) {
                    continue;
                }
                out.push(next);
                stack.extend(node.children.iter().rev().copied());
            }
            out
        }

        /// Fold one normalized edge into the tree, recording any refused mutation.
        pub fn apply_edge(
            &mut self,
            edge: &NormalizedEdge,
            record: &RecordRef,
            diagnostics: &mut Vec<Diagnostic>,
        ) -> EdgeOutcome {
            let child = self.ensure(&edge.child);
            let proposed = match &edge.parent {
                Some(parent) => ParentState::Child(self.ensure(parent)),
                None if edge.asserts_root() => ParentState::Root,
                None => return EdgeOutcome::Unchanged,
            };
            let current = self.get(child).map(|n| n.parent).unwrap_or(ParentState::Unknown);

            match (current, proposed) {
                (ParentState::Unknown, ParentState::Root) => {
                    self.set_parent(child, ParentState::Root);
                    EdgeOutcome::MarkedRoot
                }
                (ParentState::Unknown, ParentState::Child(parent)) => {
                    if parent == child || self.ancestors(parent).contains(&child) {
                        debug!(child = %edge.child, parent = self.name_of(parent), "refusing cyclic parent");
                        diagnostics.push(Diagnostic::CycleDetected {
                            record: record.clone(),
                            child: edge.child.clone(),
                            parent: self.name_of(parent).to_string(),
                        });
                        return EdgeOutcome::Cycle;
                    }
                    self.set_parent(child, ParentState::Child(parent));
                    EdgeOutcome::Anchored
                }
                (ParentState::Root, ParentState::Root) => EdgeOutcome::Unchanged,
                (ParentState::Child(have), ParentState::Child(want)) if have == want => {
                    EdgeOutcome::Unchanged
                }
                (current, proposed) => {
                    debug!(child = %edge.child, "parent already fixed; keeping first assignment");
                    diagnostics.push(Diagnostic::ParentConflict {
                        record: record.clone(),
                        child: edge.child.clone(),
                        current: self.claim_of(current),
                        proposed: self.claim_of(proposed),
                    });
                    EdgeOutcome::Conflict
                }
            }
        }

        fn set_parent(&mut self, child: NodeId, parent: ParentState) {
            if let Some(node) = self.get_mut(child) {
                node.parent = parent;
            }
            if let ParentState::Child(p) = parent {
                if let Some(parent_node) = self.get_mut(p) {
                    parent_node.children.push(child);
                }
            }
        }

        fn claim_of(&self, state: ParentState) -> ParentClaim {
            match state {
                ParentState::Child(p) => ParentClaim::Named(self.name_of(p).to_string()),
                ParentState::Root | ParentState::Unknown => ParentClaim::Root,
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::{EdgeOutcome, TaskRegistry};
        use crate::core::{Diagnostic, ParentClaim, ParentState, RecordRef};
        use crate::normalize::{EdgeOrigin, NormalizedEdge};

        fn record(key: &str) -> RecordRef {
            RecordRef {
                source: "test".into(),
                category: "LEGO".into(),
                key: key.into(),
                index: 0,
            }
        }

        fn explicit(child: &str, parent: &str) -> NormalizedEdge {
            NormalizedEdge {
                child: child.into(),
                parent: (!parent.is_empty()).then(|| parent.to_string()),
                origin: EdgeOrigin::Explicit,
            }
        }

        #[test]
        fn first_parent_wins_and_later_root_claim_is_a_conflict() {
            let mut reg = TaskRegistry::new();
            let mut diags = Vec::new();
            let r = record("Jun 23, 2025 - 12:08PM");

            assert_eq!(
                reg.apply_edge(&explicit("Bag 1", "LEGO Set X"), &r, &mut diags),
                EdgeOutcome::Anchored
            );
            assert_eq!(
                reg.apply_edge(&explicit("Bag 1", ""), &r, &mut diags),
                EdgeOutcome::Conflict
            );

            let set = reg.id_of("LEGO Set X").unwrap();
            assert_eq!(reg.by_name("Bag 1").unwrap().parent, ParentState::Child(set));
            assert_eq!(
                diags,
                vec![Diagnostic::ParentConflict {
                    record: r,
                    child: "Bag 1".into(),
                    current: ParentClaim::Named("LEGO Set X".into()),
                    proposed: ParentClaim::Root,
                }]
            );
        }

        #[test]
        fn reverse_edge_is_rejected_as_cycle() {
            let mut reg = TaskRegistry::new();
            let mut diags = Vec::new();
            let r = record("k");

            reg.apply_edge(&explicit("A", "B"), &r, &mut diags);
            assert_eq!(
                reg.apply_edge(&explicit("B", "A"), &r, &mut diags),
                EdgeOutcome::Cycle
            );
            assert_eq!(reg.by_name("B").unwrap().parent, ParentState::Unknown);
            assert!(matches!(
                &diags[..],
                [Diagnostic::CycleDetected { child, parent, .. }] if child == "B" && parent == "A"
            ));
        }

        #[test]
        fn longer_cycles_and_self_parents_are_rejected() {
            let mut reg = TaskRegistry::new();
            let mut diags = Vec::new();
            let r = record("k");

            reg.apply_edge(&explicit("A", "B"), &r, &mut diags);
            reg.apply_edge(&explicit("B", "C"), &r, &mut diags);
            assert_eq!(
                reg.apply_edge(&explicit("C", "A"), &r, &mut diags),
                EdgeOutcome::Cycle
            );
            assert_eq!(
                reg.apply_edge(&explicit("D", "D"), &r, &mut diags),
                EdgeOutcome::Cycle
            );
            assert_eq!(diags.len(), 2);
            assert_eq!(reg.path_of(reg.id_of("A").unwrap()), vec!["C", "B", "A"]);
        }

        #[test]
        fn root_is_terminal_and_repeats_are_quiet() {
            let mut reg = TaskRegistry::new();
            let mut diags = Vec::new();
            let r = record("k");

            assert_eq!(
                reg.apply_edge(&explicit("Ferrari", ""), &r, &mut diags),
                EdgeOutcome::MarkedRoot
            );
            assert_eq!(
                reg.apply_edge(&explicit("Ferrari", ""), &r, &mut diags),
                EdgeOutcome::Unchanged
            );
            reg.apply_edge(&explicit("1. GEARBOX", "Ferrari"), &r, &mut diags);
            assert_eq!(
                reg.apply_edge(&explicit("1. GEARBOX", "Ferrari"), &r, &mut diags),
                EdgeOutcome::Unchanged
            );
            assert!(diags.is_empty());

            assert_eq!(
                reg.apply_edge(&explicit("Ferrari", "Shelf"), &r, &mut diags),
                EdgeOutcome::Conflict
            );
            assert_eq!(reg.by_name("Ferrari").unwrap().parent, ParentState::Root);
        }

        #[test]
        fn bare_self_reference_only_creates_the_node() {
            let mut reg = TaskRegistry::new();
            let mut diags = Vec::new();
            let edge = NormalizedEdge {
                child: "Chapter 1".into(),
                parent: None,
                origin: EdgeOrigin::Bare,
            };
            assert_eq!(
                reg.apply_edge(&edge, &record("k"), &mut diags),
                EdgeOutcome::Unchanged
            );
            assert_eq!(reg.by_name("Chapter 1").unwrap().parent, ParentState::Unknown);
        }

        #[test]
        fn placeholder_parents_collect_children_discovered_later() {
            let mut reg = TaskRegistry::new();
            let mut diags = Vec::new();
            let r = record("k");

            let falcon = reg.ensure("Falcon");
            reg.apply_edge(&explicit("Bag 1", "Falcon"), &r, &mut diags);
            reg.apply_edge(&explicit("Bag 2", "Falcon"), &r, &mut diags);
            reg.apply_edge(&explicit("Cockpit", "Bag 2"), &r, &mut diags);

            let names: Vec<&str> = reg
                .subtree(falcon)
                .into_iter()
                .map(|id| reg.name_of(id))
                .collect();
            assert_eq!(names, vec!["Falcon", "Bag 1", "Bag 2", "Cockpit"]);
            assert_eq!(
                reg.top_level().map(|n| n.name.as_str()).collect::<Vec<_>>(),
                vec!["Falcon"]
            );
        }
    }
}

pub mod merge {
    //! Combines record sets by category before ingestion.
    //!
    //! Two sets supplying the same timestamp key is a collision. `Strict` refuses the combine;
    //! `BestEffort` keeps both sessions under the key, in source order, and reports it.
    //! Neither lets one set overwrite another.

    use crate::core::{Diagnostic, MergeError, RawSession, RecordSet};
    use indexmap::IndexMap;
    use serde::{Deserialize, Serialize};
    use tracing::{debug, warn};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum MergePolicy {
        #[default]
        Strict,
        BestEffort,
    }

    /// Where a shared key counts as a collision.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum MergeScope {
        /// Only keys shared by two sets of the same category.
        #[default]
        Category,
        /// Any key shared by two sets.
        Global,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SourcedSession {
        pub source: String,
        pub raw: RawSession,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Collision {
        pub key: String,
        pub categories: Vec<String>,
        pub sources: Vec<String>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CombinedRecords {
        /// Category → key → sessions from every set that supplied the key.
        pub categories: IndexMap<String, IndexMap<String, Vec<SourcedSession>>>,
        pub collisions: Vec<Collision>,
        /// Carried over from the sets' own `load_diagnostics`, in set order.
        #[serde(default)]
        pub load_diagnostics: Vec<Diagnostic>,
    }

    impl CombinedRecords {
        pub fn record_count(&self) -> usize {
            self.categories
                .values()
                .flat_map(|keys| keys.values())
                .map(Vec::len)
                .sum()
        }

        /// `(category, key, index under key, session)` in combine order.
        pub fn records(&self) -> impl Iterator<Item = (&str, &str, usize, &SourcedSession)> {
            self.categories.iter().flat_map(|(category, keys)| {
                keys.iter().flat_map(move |(key, sessions)| {
                    sessions
                        .iter()
                        .enumerate()
                        .map(move |(idx, s)| (category.as_str(), key.as_str(), idx, s))
                })
            })
        }
    }

    #[derive(Default)]
    struct KeyOwners {
        sets: Vec<usize>,
    }

    pub fn combine(
        sets: &[RecordSet],
        policy: MergePolicy,
        scope: MergeScope,
    ) -> Result<CombinedRecords, MergeError> {
        let mut combined = CombinedRecords::default();
        let mut owners: IndexMap<(String, String), KeyOwners> = IndexMap::new();

        for (set_idx, set) in sets.iter().enumerate() {
            debug!(source = %set.source, category = %set.category, records = set.record_count(), "combining record set");
            combined
                .load_diagnostics
                .extend(set.load_diagnostics.iter().cloned());
            let bucket = combined.categories.entry(set.category.clone()).or_default();

            for (key, records) in &set.entries {
                let scope_label = match scope {
                    MergeScope::Category => set.category.clone(),
                    MergeScope::Global => String::new(),
                };
                let owner = owners.entry((scope_label, key.clone())).or_default();

                if let Some(&first) = owner.sets.first() {
                    if !owner.sets.contains(&set_idx) {
                        if policy == MergePolicy::Strict {
                            return Err(MergeError::DuplicateTimestampKey {
                                key: key.clone(),
                                category: sets[first].category.clone(),
                                first_source: sets[first].source.clone(),
                                second_source: set.source.clone(),
                            });
                        }
                        warn!(key = %key, first = %sets[first].source, second = %set.source, "duplicate timestamp key; keeping both");
                    }
                }
                if !owner.sets.contains(&set_idx) {
                    owner.sets.push(set_idx);
                }

                bucket
                    .entry(key.clone())
                    .or_default()
                    .extend(records.iter().map(|raw| SourcedSession {
                        source: set.source.clone(),
                        raw: raw.clone(),
                    }));
            }
        }

        combined.collisions = owners
            .into_iter()
            .filter(|(_, owner)| owner.sets.len() > 1)
            .map(|((_, key), owner)| {
                let mut categories: Vec<String> = Vec::new();
                for &idx in &owner.sets {
                    if !categories.contains(&sets[idx].category) {
                        categories.push(sets[idx].category.clone());
                    }
                }
                Collision {
                    key,
                    categories,
                    sources: owner.sets.iter().map(|&i| sets[i].source.clone()).collect(),
                }
            })
            .collect();

        Ok(combined)
    }

    #[cfg(test)]
    mod tests {
        use super::{MergePolicy, MergeScope, combine};
        use crate::core::{MergeError, RawSession, RecordSet};

        const KEY: &str = "Jun 23, 2025 - 12:08PM";

        fn set(source: &str, category: &str, key: &str, title: &str) -> RecordSet {
            let mut s = RecordSet::new(source, category);
            s.push(key, RawSession::new("1h0m0s", title));
            s
        }

        #[test]
        fn strict_combine_names_key_and_both_sources() {
            let sets = [
                set("falcon", "LEGO", KEY, "Falcon"),
                set("titanic", "LEGO", KEY, "Titanic"),
            ];
            let err = combine(&sets, MergePolicy::Strict, MergeScope::Category).unwrap_err();
            assert_eq!(
                err,
                MergeError::DuplicateTimestampKey {
                    key: KEY.into(),
                    category: "LEGO".into(),
                    first_source: "falcon".into(),
                    second_source: "titanic".into(),
                }
            );
            assert!(err.to_string().contains("falcon"));
        }

        #[test]
        fn best_effort_keeps_every_session_under_the_key() {
            let sets = [
                set("falcon", "LEGO", KEY, "Falcon"),
                set("titanic", "LEGO", KEY, "Titanic"),
                set("ferrari", "LEGO", KEY, "Ferrari"),
            ];
            let combined = combine(&sets, MergePolicy::BestEffort, MergeScope::Category).unwrap();

            let under_key = &combined.categories["LEGO"][KEY];
            let titles: Vec<&str> = under_key.iter().map(|s| s.raw.task_title.as_str()).collect();
            assert_eq!(titles, vec!["Falcon", "Titanic", "Ferrari"]);
            assert_eq!(combined.collisions.len(), 1);
            assert_eq!(
                combined.collisions[0].sources,
                vec!["falcon", "titanic", "ferrari"]
            );
            assert_eq!(combined.record_count(), 3);
        }

        #[test]
        fn scope_decides_whether_categories_collide() {
            let sets = [
                set("walking", "Walking", KEY, "Walking"),
                set("cycling", "Cycling", KEY, "Cycling"),
            ];
            let per_category = combine(&sets, MergePolicy::Strict, MergeScope::Category).unwrap();
            assert!(per_category.collisions.is_empty());
            assert_eq!(per_category.categories.len(), 2);

            assert!(combine(&sets, MergePolicy::Strict, MergeScope::Global).is_err());
            let global = combine(&sets, MergePolicy::BestEffort, MergeScope::Global).unwrap();
            assert_eq!(global.collisions[0].categories, vec!["Walking", "Cycling"]);
        }

        #[test]
        fn disjoint_keys_merge_in_order() {
            let mut a = set("a", "Books", "Jan 1, 2024 - 5:00AM", "Atomic Habits");
            a.push("Jan 2, 2024 - 5:00AM", RawSession::new("10m0s", "Atomic Habits"));
            let b = set("b", "Books", "Jan 3, 2024 - 5:00AM", "Harry Potter");
            let combined = combine(&[a, b], MergePolicy::Strict, MergeScope::Category).unwrap();

            let keys: Vec<&str> = combined.records().map(|(_, key, _, _)| key).collect();
            assert_eq!(
                keys,
                vec![
                    "Jan 1, 2024 - 5:00AM",
                    "Jan 2, 2024 - 5:00AM",
                    "Jan 3, 2024 - 5:00AM"
                ]
            );
            assert!(combined.collisions.is_empty());
        }
    }
}

pub mod config {
    //! Ingestion settings. Everything defaults; a JSON file may override any subset.

    use crate::merge::{MergePolicy, MergeScope};
    use anyhow::{Context, Result};
    use chrono::Duration;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct IngestOptions {
        pub merge_policy: MergePolicy,
        pub merge_scope: MergeScope,
        /// Minutes between back-to-back sessions listed under one key.
        pub break_minutes: i64,
    }

    impl Default for IngestOptions {
        fn default() -> Self {
            Self {
                merge_policy: MergePolicy::Strict,
                merge_scope: MergeScope::Category,
                break_minutes: 15,
            }
        }
    }

    impl IngestOptions {
        pub fn from_json_str(text: &str) -> Result<Self> {
            serde_json::from_str(text).context("parsing ingest options")
        }

        pub fn break_between_sessions(&self) -> Duration {
            Duration::minutes(self.break_minutes.clamp(0, 24 * 60))
        }
    }

}

pub mod ledger {
    //! The session ledger: owns every session and the task registry, and answers aggregate queries.
    //!
    //! Ingestion is single-writer. Batches are parsed up front and committed in chronological
    //! order (stable for equal instants), so first-write-wins follows session time rather than
    //! file order. A record that fails to parse leaves no session and no hierarchy edges behind.

    use crate::config::IngestOptions;
    use crate::core::*;
    use crate::hierarchy::TaskRegistry;
    use crate::merge::{CombinedRecords, MergePolicy, MergeScope, combine};
    use crate::normalize::normalize_completions;
    use crate::parser::{parse_duration, parse_timestamp_key};
    use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
    use serde::Serialize;
    use std::{
        collections::{BTreeMap, HashMap},
        ops::RangeBounds,
        sync::{
            Arc, RwLock,
            atomic::{AtomicBool, Ordering},
        },
    };
    use tracing::{debug, info, warn};

    /// Ledger shared between one writer and any number of readers.
    pub type SharedLedger = Arc<RwLock<SessionLedger>>;

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
    pub struct IngestReport {
        pub ingested: usize,
        pub skipped: usize,
        pub diagnostics: usize,
        pub cancelled: bool,
    }

    /// Polled before each commit of a batch.
    pub trait CancelSignal {
        fn is_cancelled(&self) -> bool;
    }

    impl CancelSignal for AtomicBool {
        fn is_cancelled(&self) -> bool {
            self.load(Ordering::Relaxed)
        }
    }

    struct ParsedRecord<'a> {
        origin: RecordRef,
        instant: NaiveDateTime,
        duration_seconds: u64,
        raw: &'a RawSession,
    }

    /// Sources (and their categories) that have committed sessions under one key.
    #[derive(Debug, Clone, Default)]
    struct KeyOwners {
        categories: Vec<String>,
        sources: Vec<String>,
    }

    impl KeyOwners {
        fn record(&mut self, category: &str, source: &str) {
            if !self.categories.iter().any(|c| c == category) {
                self.categories.push(category.to_string());
            }
            if !self.sources.iter().any(|s| s == source) {
                self.sources.push(source.to_string());
            }
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct SessionLedger {
        options: IngestOptions,
        registry: TaskRegistry,
        sessions: Vec<Session>,
        by_instant: BTreeMap<NaiveDateTime, Vec<usize>>,
        /// End of the latest session scheduled under each (source, category, key).
        chain_ends: HashMap<(String, String, String), NaiveDateTime>,
        /// (scope label, key) → who already supplied sessions, across every batch.
        key_owners: HashMap<(String, String), KeyOwners>,
        diagnostics: Vec<Diagnostic>,
    }

    impl SessionLedger {
        pub fn new() -> Self {
            Self::with_options(IngestOptions::default())
        }

        pub fn with_options(options: IngestOptions) -> Self {
            Self {
                options,
                ..Self::default()
            }
        }

        /// Combine `sets` under the configured merge policy and ingest the result.
        pub fn from_record_sets(
            sets: &[RecordSet],
            options: IngestOptions,
        ) -> Result<(Self, IngestReport), MergeError> {
            let mut ledger = Self::with_options(options);
            let report = ledger.ingest_record_sets(sets)?;
            Ok((ledger, report))
        }

        pub fn options(&self) -> &IngestOptions {
            &self.options
        }

        pub fn into_shared(self) -> SharedLedger {
            Arc::new(RwLock::new(self))
        }

        /* ------------------------------ Ingestion ------------------------------ */

        /// Ingest a single record. Parse failures are recorded as diagnostics and return `None`.
        /// A key already supplied by another source is reported; under `Strict` the record is
        /// refused as well.
        pub fn ingest(&mut self, origin: RecordRef, raw: &RawSession) -> Option<SessionId> {
            let clash =
                self.prior_owner_clash(&origin.category, &origin.key, &[origin.source.as_str()]);
            if let Some((diagnostic, _)) = clash {
                warn!(%diagnostic, "timestamp key already supplied by another source");
                self.diagnostics.push(diagnostic);
                if self.options.merge_policy == MergePolicy::Strict {
                    return None;
                }
            }
            match parse_record(origin, raw) {
                Ok(parsed) => Some(self.commit(parsed)),
                Err(diagnostic) => {
                    warn!(%diagnostic, "skipping record");
                    self.diagnostics.push(diagnostic);
                    None
                }
            }
        }

        pub fn ingest_record_sets(&mut self, sets: &[RecordSet]) -> Result<IngestReport, MergeError> {
            let combined = combine(sets, self.options.merge_policy, self.options.merge_scope)?;
            self.ingest_combined(&combined)
        }

        pub fn ingest_combined(&mut self, combined: &CombinedRecords) -> Result<IngestReport, MergeError> {
            self.ingest_combined_with_cancel(combined, &AtomicBool::new(false))
        }

        /// Like `ingest_combined`, but stops before the next commit once `cancel` fires.
        /// Whatever was committed stays; diagnostics collected so far are kept.
        ///
        /// Keys already supplied by other sources in earlier batches are collisions too: under
        /// `Strict` the batch is refused before anything is committed.
        pub fn ingest_combined_with_cancel(
            &mut self,
            combined: &CombinedRecords,
            cancel: &impl CancelSignal,
        ) -> Result<IngestReport, MergeError> {
            let mut earlier_batches = Vec::new();
            for (category, keys) in &combined.categories {
                for (key, sessions) in keys {
                    let mut sources: Vec<&str> = Vec::new();
                    for s in sessions {
                        if !sources.contains(&s.source.as_str()) {
                            sources.push(&s.source);
                        }
                    }
                    let Some((diagnostic, err)) = self.prior_owner_clash(category, key, &sources)
                    else {
                        continue;
                    };
                    if self.options.merge_policy == MergePolicy::Strict {
                        return Err(err);
                    }
                    warn!(%diagnostic, "timestamp key already supplied by an earlier batch");
                    earlier_batches.push(diagnostic);
                }
            }

            let before = self.diagnostics.len();
            let mut report = IngestReport::default();

            self.diagnostics.extend(earlier_batches);
            for collision in &combined.collisions {
                self.diagnostics.push(Diagnostic::DuplicateTimestampKey {
                    key: collision.key.clone(),
                    categories: collision.categories.clone(),
                    sources: collision.sources.clone(),
                });
            }
            for diagnostic in &combined.load_diagnostics {
                if matches!(diagnostic, Diagnostic::MalformedRecord { .. }) {
                    report.skipped += 1;
                }
                self.diagnostics.push(diagnostic.clone());
            }

            let mut parsed = Vec::with_capacity(combined.record_count());
            for (category, key, index, sourced) in combined.records() {
                let origin = RecordRef {
                    source: sourced.source.clone(),
                    category: category.to_string(),
                    key: key.to_string(),
                    index,
                };
                match parse_record(origin, &sourced.raw) {
                    Ok(record) => parsed.push(record),
                    Err(diagnostic) => {
                        warn!(%diagnostic, "skipping record");
                        report.skipped += 1;
                        self.diagnostics.push(diagnostic);
                    }
                }
            }

            parsed.sort_by_key(|record| record.instant);
            for record in parsed {
                if cancel.is_cancelled() {
                    info!(ingested = report.ingested, "ingestion cancelled");
                    report.cancelled = true;
                    break;
                }
                self.commit(record);
                report.ingested += 1;
            }

            report.diagnostics = self.diagnostics.len() - before;
            info!(
                ingested = report.ingested,
                skipped = report.skipped,
                diagnostics = report.diagnostics,
                "ingestion finished"
            );
            Ok(report)
        }

        fn scope_label(&self, category: &str) -> String {
            match self.options.merge_scope {
                MergeScope::Category => category.to_string(),
                MergeScope::Global => String::new(),
            }
        }

        /// Collision when `key` was committed earlier by a source outside `incoming`, as both the
        /// best-effort diagnostic and the strict error.
        fn prior_owner_clash(
            &self,
            category: &str,
            key: &str,
            incoming: &[&str],
        ) -> Option<(Diagnostic, MergeError)> {
            let owners = self.key_owners.get(&(self.scope_label(category), key.to_string()))?;
            let newcomers: Vec<&str> = incoming
                .iter()
                .copied()
                .filter(|s| !owners.sources.iter().any(|o| o == s))
                .collect();
            if newcomers.is_empty() {
                return None;
            }
            let mut categories = owners.categories.clone();
            if !categories.iter().any(|c| c == category) {
                categories.push(category.to_string());
            }
            let err = MergeError::DuplicateTimestampKey {
                key: key.to_string(),
                category: category.to_string(),
                first_source: owners.sources.first().cloned().unwrap_or_default(),
                second_source: newcomers[0].to_string(),
            };
            let mut sources = owners.sources.clone();
            sources.extend(newcomers.into_iter().map(str::to_string));
            let diagnostic = Diagnostic::DuplicateTimestampKey {
                key: key.to_string(),
                categories,
                sources,
            };
            Some((diagnostic, err))
        }

        fn commit(&mut self, record: ParsedRecord<'_>) -> SessionId {
            let ParsedRecord {
                origin,
                instant,
                duration_seconds,
                raw,
            } = record;

            let edges = normalize_completions(raw);
            for edge in &edges {
                self.registry
                    .apply_edge(edge, &origin, &mut self.diagnostics);
            }

            let title = self.registry.ensure(&raw.task_title);
            let mut completed: Vec<NodeId> = Vec::with_capacity(edges.len());
            for edge in &edges {
                let id = self.registry.ensure(&edge.child);
                if !completed.contains(&id) {
                    completed.push(id);
                }
            }

            self.key_owners
                .entry((self.scope_label(&origin.category), origin.key.clone()))
                .or_default()
                .record(&origin.category, &origin.source);

            let chain_key = (
                origin.source.clone(),
                origin.category.clone(),
                origin.key.clone(),
            );
            let start = match self.chain_ends.get(&chain_key) {
                Some(prev_end) => prev_end
                    .checked_add_signed(self.options.break_between_sessions())
                    .unwrap_or(NaiveDateTime::MAX),
                None => instant,
            };
            let end = i64::try_from(duration_seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .and_then(|d| start.checked_add_signed(d))
                .unwrap_or(NaiveDateTime::MAX);
            self.chain_ends.insert(chain_key, end);

            if let Some(node) = self.registry.get_mut(title) {
                node.total_duration_seconds = node.total_duration_seconds.saturating_add(duration_seconds);
            }
            for &id in &completed {
                if let Some(node) = self.registry.get_mut(id) {
                    node.completion_count += 1;
                    node.first_completed_at = Some(node.first_completed_at.map_or(end, |t| t.min(end)));
                    node.last_completed_at = Some(node.last_completed_at.map_or(end, |t| t.max(end)));
                }
            }

            let id = SessionId::new();
            debug!(record = %origin, title = %raw.task_title, seconds = duration_seconds, "session stored");
            let idx = self.sessions.len();
            self.sessions.push(Session {
                id,
                origin,
                instant,
                start,
                end,
                duration_seconds,
                task_title: title,
                completed,
                note: raw.note.clone(),
            });
            self.by_instant.entry(instant).or_default().push(idx);
            id
        }

        /* ------------------------------- Queries ------------------------------- */

        pub fn registry(&self) -> &TaskRegistry {
            &self.registry
        }

        pub fn node(&self, name: &str) -> Option<&TaskNode> {
            self.registry.by_name(name)
        }

        pub fn diagnostics(&self) -> &[Diagnostic] {
            &self.diagnostics
        }

        pub fn session_count(&self) -> usize {
            self.sessions.len()
        }

        pub fn session(&self, id: SessionId) -> Option<&Session> {
            self.sessions.iter().find(|s| s.id == id)
        }

        /// All sessions ordered by instant; equal instants keep ingestion order.
        pub fn sessions(&self) -> impl Iterator<Item = &Session> {
            self.by_instant
                .values()
                .flat_map(move |idxs| idxs.iter().map(move |&i| &self.sessions[i]))
        }

        /// Inclusive range, ordered by instant.
        pub fn sessions_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<&Session> {
            if start > end {
                return vec![];
            }
            self.by_instant
                .range(start..=end)
                .flat_map(move |(_, idxs)| idxs.iter().map(move |&i| &self.sessions[i]))
                .collect()
        }

        /// Seconds of the node's own sessions (sessions titled with it).
        pub fn total_duration_for_node(&self, name: &str) -> Option<u64> {
            self.node(name).map(|n| n.total_duration_seconds)
        }

        /// Own seconds plus those of every transitive descendant.
        pub fn subtree_duration_for_node(&self, name: &str) -> Option<u64> {
            let id = self.registry.id_of(name)?;
            Some(
                self.registry
                    .subtree(id)
                    .into_iter()
                    .filter_map(|n| self.registry.get(n))
                    .map(|n| n.total_duration_seconds)
                    .fold(0u64, u64::saturating_add),
            )
        }

        pub fn daily_total(&self, date: NaiveDate) -> u64 {
            let start = date.and_time(NaiveTime::MIN);
            match date.succ_opt() {
                Some(next) => self.sum_range(start..next.and_time(NaiveTime::MIN)),
                None => self.sum_range(start..),
            }
        }

        /// Every calendar day with at least one session.
        pub fn daily_totals(&self) -> BTreeMap<NaiveDate, u64> {
            let mut out = BTreeMap::new();
            for session in self.sessions() {
                let total = out.entry(session.instant.date()).or_insert(0u64);
                *total = total.saturating_add(session.duration_seconds);
            }
            out
        }

        pub fn category_total(&self, category: &str) -> u64 {
            self.sessions
                .iter()
                .filter(|s| s.category() == category)
                .map(|s| s.duration_seconds)
                .fold(0, u64::saturating_add)
        }

        pub fn children_of(&self, name: &str) -> Vec<&TaskNode> {
            self.node(name)
                .map(|n| {
                    n.children
                        .iter()
                        .filter_map(|&c| self.registry.get(c))
                        .collect()
                })
                .unwrap_or_default()
        }

        /// Explicit roots plus nodes whose parent has not been observed yet.
        pub fn roots(&self) -> Vec<&TaskNode> {
            self.registry.top_level().collect()
        }

        pub fn path_of(&self, name: &str) -> Option<Vec<&str>> {
            self.registry.id_of(name).map(|id| self.registry.path_of(id))
        }

        fn sum_range(&self, range: impl RangeBounds<NaiveDateTime>) -> u64 {
            self.by_instant
                .range(range)
                .flat_map(|(_, idxs)| idxs.iter())
                .map(|&i| self.sessions[i].duration_seconds)
                .fold(0, u64::saturating_add)
        }
    }

    fn parse_record(origin: RecordRef, raw: &RawSession) -> Result<ParsedRecord<'_>, Diagnostic> {
        let instant = match parse_timestamp_key(&origin.key) {
            Ok(instant) => instant,
            Err(err) => return Err(Diagnostic::from_parse_error(origin, err)),
        };
        let duration_seconds = match parse_duration(&raw.duration) {
            Ok(seconds) => seconds,
            Err(err) => return Err(Diagnostic::from_parse_error(origin, err)),
        };
        Ok(ParsedRecord {
            origin,
            instant,
            duration_seconds,
            raw,
        })
    }

}

pub mod storage {
    //! Loading collaborator. Reads exported JSON into record sets; the ledger never sees a path.

    use crate::core::{Diagnostic, RawSession, RecordRef, RecordSet};
    use anyhow::{Context, Result, bail};
    use indexmap::IndexMap;
    use serde::{
        Deserialize, Deserializer,
        de::{MapAccess, Visitor},
    };
    use serde_json::Value;
    use std::{collections::HashMap, fmt, fs, marker::PhantomData, path::Path};
    use tracing::{debug, warn};

    pub trait RecordSetLoader {
        fn load_file(&self, abs_path: &Path) -> Result<Vec<RecordSet>>;
    }

    /// Reads `{key: [records]}` or `{category: {key: [records]}}` files.
    #[derive(Debug, Clone, Default)]
    pub struct JsonRecordLoader {
        /// Category for bare per-activity files; the file stem when unset.
        pub default_category: Option<String>,
    }

    impl RecordSetLoader for JsonRecordLoader {
        fn load_file(&self, abs_path: &Path) -> Result<Vec<RecordSet>> {
            let text =
                fs::read_to_string(abs_path).with_context(|| format!("reading {:?}", abs_path))?;
            let stem = abs_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| abs_path.display().to_string());
            let category = self.default_category.as_deref().unwrap_or(&stem);
            parse_record_sets_from_str(&stem, category, &text)
                .with_context(|| format!("loading {:?}", abs_path))
        }
    }

    /* --------------------------- Document shape --------------------------- */

    /// Object members in document order, repeats included.
    struct Members<T>(Vec<(String, T)>);

    impl<'de, T: Deserialize<'de>> Deserialize<'de> for Members<T> {
        fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            struct MembersVisitor<T>(PhantomData<T>);

            impl<'de, T: Deserialize<'de>> Visitor<'de> for MembersVisitor<T> {
                type Value = Members<T>;

                fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str("a JSON object")
                }

                fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
                where
                    A: MapAccess<'de>,
                {
                    let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
                    while let Some(member) = map.next_entry()? {
                        out.push(member);
                    }
                    Ok(Members(out))
                }
            }

            deserializer.deserialize_map(MembersVisitor(PhantomData))
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Section {
        Records(Vec<Value>),
        Category(Members<Vec<Value>>),
    }

    /* ------------------------------ Loading ------------------------------ */

    /// Parse one exported document. Fails only when the document is not a record collection;
    /// unreadable records and repeated keys land in each set's `load_diagnostics`.
    pub fn parse_record_sets_from_str(
        source: &str,
        default_category: &str,
        text: &str,
    ) -> Result<Vec<RecordSet>> {
        let Members(top) = serde_json::from_str::<Members<Section>>(text).context(
            "expected {key: [records]} or {category: {key: [records]}} with array or object values",
        )?;

        if top.iter().all(|(_, s)| matches!(s, Section::Records(_))) {
            let mut set = RecordSet::new(source, default_category);
            let mut listed = HashMap::new();
            for (key, section) in top {
                if let Section::Records(records) = section {
                    absorb(&mut set, &mut listed, key, records);
                }
            }
            debug!(source, category = default_category, keys = set.entries.len(), "loaded bare record set");
            return Ok(vec![set]);
        }

        if top.iter().all(|(_, s)| matches!(s, Section::Category(_))) {
            let mut distinct: Vec<&str> = Vec::new();
            for (category, _) in &top {
                if !distinct.contains(&category.as_str()) {
                    distinct.push(category);
                }
            }
            let multi = distinct.len() > 1;

            let mut sets: IndexMap<String, (RecordSet, HashMap<String, usize>)> = IndexMap::new();
            for (category, section) in top {
                let Section::Category(Members(keyed)) = section else { continue };
                let (set, listed) = sets.entry(category.clone()).or_insert_with(|| {
                    let name = if multi {
                        format!("{source}:{category}")
                    } else {
                        source.to_string()
                    };
                    (RecordSet::new(name, category.clone()), HashMap::new())
                });
                for (key, records) in keyed {
                    absorb(set, listed, key, records);
                }
            }
            for (set, _) in sets.values() {
                debug!(source = %set.source, category = %set.category, keys = set.entries.len(), "loaded record set");
            }
            return Ok(sets.into_values().map(|(set, _)| set).collect());
        }

        bail!("mixed document: expected {{key: [records]}} or {{category: {{key: [records]}}}}")
    }

    /// Add the records listed under `key`, one at a time. `listed` counts records already seen
    /// per key so indexes match the document.
    fn absorb(set: &mut RecordSet, listed: &mut HashMap<String, usize>, key: String, records: Vec<Value>) {
        let repeated = listed.contains_key(&key);
        let seen = listed.entry(key.clone()).or_insert(0);
        if repeated {
            warn!(source = %set.source, key = %key, "timestamp key repeated in one document; keeping both");
            set.load_diagnostics.push(Diagnostic::DuplicateTimestampKey {
                key: key.clone(),
                categories: vec![set.category.clone()],
                sources: vec![set.source.clone(), set.source.clone()],
            });
        }

        for value in records {
            let index = *seen;
            *seen += 1;
            match serde_json::from_value::<RawSession>(value) {
                Ok(raw) => {
                    set.push(key.clone(), raw);
                }
                Err(err) => {
                    let diagnostic = Diagnostic::MalformedRecord {
                        record: RecordRef {
                            source: set.source.clone(),
                            category: set.category.clone(),
                            key: key.clone(),
                            index,
                        },
                        reason: err.to_string(),
                    };
                    warn!(%diagnostic, "skipping record");
                    set.load_diagnostics.push(diagnostic);
                }
            }
        }
    }

}

pub mod format {
    //! Plain-text renderings of the ledger.

    use crate::core::{NodeId, ParentState};
    use crate::ledger::SessionLedger;
    use crate::parser::format_duration;
    use std::fmt::Write;

    /// Indented task tree with own time, subtree time and completion counts.
    pub fn format_task_tree(ledger: &SessionLedger) -> String {
        let mut out = String::new();
        for node in ledger.roots() {
            render_node(ledger, node.id, 0, &mut out);
        }
        out
    }

    fn render_node(ledger: &SessionLedger, id: NodeId, depth: usize, out: &mut String) {
        let registry = ledger.registry();
        let Some(node) = registry.get(id) else { return };
        let subtree = ledger.subtree_duration_for_node(&node.name).unwrap_or(0);

        let marker = match node.parent {
            ParentState::Unknown if depth == 0 => " (parent unknown)",
            _ => "",
        };
        let _ = write!(
            out,
            "{:indent$}{}{}  own {}  total {}",
            "",
            node.name,
            marker,
            format_duration(node.total_duration_seconds),
            format_duration(subtree),
            indent = depth * 2
        );
        if node.completion_count > 0 {
            let _ = write!(out, "  done x{}", node.completion_count);
        }
        out.push('\n');

        for &child in &node.children {
            render_node(ledger, child, depth + 1, out);
        }
    }

}

pub mod projectors {
    pub mod focus_record_projector {
        //! Projects ledger sessions into the focus-record export shape consumed by the
        //! time-tracking app, plus a per-task completion timeline.

        use crate::core::ParentState;
        use crate::ledger::SessionLedger;
        use chrono::NaiveDateTime;
        use serde::Serialize;

        const ISO: &str = "%Y-%m-%dT%H:%M:%S";

        #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
        #[serde(rename_all = "camelCase")]
        pub struct FocusRecordTask {
            pub task_id: String,
            pub title: String,
            pub tags: Vec<String>,
            pub project_name: String,
            pub start_time: String,
            pub end_time: String,
        }

        #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
        #[serde(rename_all = "camelCase")]
        pub struct FocusRecord {
            pub id: String,
            pub start_time: String,
            pub end_time: String,
            pub pause_duration: u64,
            /// 1 = finished focus session.
            pub status: u8,
            pub tasks: Vec<FocusRecordTask>,
            pub added: bool,
            pub note: String,
        }

        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
        pub struct FocusRecordsOutput {
            pub add: Vec<FocusRecord>,
            pub update: Vec<FocusRecord>,
            pub delete: Vec<FocusRecord>,
        }

        #[serde_with::skip_serializing_none]
        #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
        #[serde(rename_all = "camelCase")]
        pub struct TaskCompletion {
            pub task: String,
            pub parent: Option<String>,
            pub top_level: bool,
            pub completion_count: u32,
            pub first_completed_at: Option<String>,
            pub last_completed_at: Option<String>,
        }

        /// One export record per session, in ledger order.
        pub fn project_sessions(ledger: &SessionLedger) -> FocusRecordsOutput {
            let add = ledger
                .sessions()
                .map(|s| {
                    let (start, end) = (iso(s.start), iso(s.end));
                    FocusRecord {
                        id: s.id.0.simple().to_string(),
                        start_time: start.clone(),
                        end_time: end.clone(),
                        pause_duration: 0,
                        status: 1,
                        tasks: vec![FocusRecordTask {
                            task_id: String::new(),
                            title: ledger.registry().name_of(s.task_title).to_string(),
                            tags: vec![],
                            project_name: s.category().to_string(),
                            start_time: start,
                            end_time: end,
                        }],
                        added: true,
                        note: s.note.clone().unwrap_or_default(),
                    }
                })
                .collect();
            FocusRecordsOutput {
                add,
                ..FocusRecordsOutput::default()
            }
        }

        /// Every node completed at least once, in first-mention order.
        pub fn project_completions(ledger: &SessionLedger) -> Vec<TaskCompletion> {
            let registry = ledger.registry();
            registry
                .iter()
                .filter(|n| n.completion_count > 0)
                .map(|n| TaskCompletion {
                    task: n.name.clone(),
                    parent: match n.parent {
                        ParentState::Child(p) => Some(registry.name_of(p).to_string()),
                        ParentState::Root | ParentState::Unknown => None,
                    },
                    top_level: n.parent == ParentState::Root,
                    completion_count: n.completion_count,
                    first_completed_at: n.first_completed_at.map(iso),
                    last_completed_at: n.last_completed_at.map(iso),
                })
                .collect()
        }

        fn iso(dt: NaiveDateTime) -> String {
            dt.format(ISO).to_string()
        }

    }
}

pub use ledger::SessionLedger;
pub use parser::{format_duration, parse_duration, parse_timestamp_key};
