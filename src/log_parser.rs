use crate::{
    error::{ExperimentError, Result},
    tabular::{split_commas, Table, Value},
};


/// Columns of the solver's low-verbosity summary line, in output order.
pub const SUMMARY_COLUMNS: [&str; 13] = [
    "k",
    "iterations",
    "time",
    "improvements",
    "minimums",
    "updates",
    "aspirations",
    "conflicts",
    "guidance",
    "score",
    "final_conflicts",
    "final_guidance",
    "final_score",
];

pub const TRACE_COLUMNS: [&str; 5] = ["kind", "iteration", "conflicts", "guidance", "score"];

/// Sentinel for "no signal" where the raw value has no logarithm.
pub const NO_SIGNAL: f64 = -1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct MoveSample {
    pub iteration: u64,
    pub conflicts: f64,
    pub guidance: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Improvement {
    pub iteration: u64,
    pub best_conflicts: f64,
    pub best_guidance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogLine {
    Move(MoveSample),
    Improve(Improvement),
    Start { iteration: u64 },
    Min,
    /// Untagged aggregate line, fields kept as written.
    Summary(Vec<String>),
}

/// Natural log, or [`NO_SIGNAL`] for raw values that are not positive.
pub fn log_or_sentinel(raw: f64) -> f64 {
    if raw > 0.0 {
        raw.ln()
    } else {
        NO_SIGNAL
    }
}

/// Classifies one non-empty line of solver output. `line_no` is only used for errors.
pub fn parse_line(line: &str, line_no: usize) -> Result<LogLine> {
    let parts = split_commas(line);
    let field = |idx: usize| -> Result<&str> {
        parts.get(idx).map(String::as_str).ok_or_else(|| {
            ExperimentError::parse(line_no, format!("{} is missing field {idx}", parts[0]))
        })
    };
    let number = |idx: usize| -> Result<f64> {
        let raw = field(idx)?;
        raw.parse::<f64>().map_err(|_| {
            ExperimentError::parse(line_no, format!("{raw:?} is not a number"))
        })
    };
    let iteration = |idx: usize| -> Result<u64> {
        let raw = field(idx)?;
        raw.parse::<u64>().map_err(|_| {
            ExperimentError::parse(line_no, format!("{raw:?} is not an iteration"))
        })
    };

    match parts[0].as_str() {
        "MOVE" => {
            if parts.len() < 5 {
                return Err(ExperimentError::parse(
                    line_no,
                    format!("MOVE needs at least 5 fields, got {}", parts.len()),
                ));
            }
            let n = parts.len();
            Ok(LogLine::Move(MoveSample {
                iteration: iteration(1)?,
                conflicts: log_or_sentinel(number(n - 3)?),
                guidance: log_or_sentinel(number(n - 2)?),
                score: log_or_sentinel(number(n - 1)?),
            }))
        }
        "IMPROVE" => Ok(LogLine::Improve(Improvement {
            iteration: iteration(1)?,
            best_conflicts: log_or_sentinel(number(2)?),
            best_guidance: log_or_sentinel(number(3)?),
        })),
        "START" => Ok(LogLine::Start {
            iteration: iteration(1)?,
        }),
        "MIN" => Ok(LogLine::Min),
        _ => {
            for idx in 0..parts.len() {
                number(idx)?;
            }
            Ok(LogLine::Summary(parts))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    Move(MoveSample),
    Improve(Improvement),
    Start(u64),
}

/// Everything a traced run printed. Events keep the order of the output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    pub events: Vec<TraceEvent>,
    pub minimums: usize,
    pub summary: Option<Vec<String>>,
}

impl Trace {
    pub fn moves(&self) -> impl Iterator<Item = &MoveSample> {
        self.events.iter().filter_map(|event| match event {
            TraceEvent::Move(m) => Some(m),
            _ => None,
        })
    }

    pub fn improvements(&self) -> impl Iterator<Item = &Improvement> {
        self.events.iter().filter_map(|event| match event {
            TraceEvent::Improve(i) => Some(i),
            _ => None,
        })
    }

    /// Iterations at which the search restarted.
    pub fn starts(&self) -> impl Iterator<Item = u64> + '_ {
        self.events.iter().filter_map(|event| match event {
            TraceEvent::Start(iteration) => Some(*iteration),
            _ => None,
        })
    }

    /// Flattens the trace into one row per event, in output order.
    pub fn to_table(&self) -> Result<Table> {
        let mut table = Table::new(TRACE_COLUMNS);
        for event in &self.events {
            let row = match event {
                TraceEvent::Move(m) => [
                    Value::from("move"),
                    (m.iteration as f64).into(),
                    m.conflicts.into(),
                    m.guidance.into(),
                    m.score.into(),
                ],
                TraceEvent::Improve(i) => [
                    Value::from("improve"),
                    (i.iteration as f64).into(),
                    i.best_conflicts.into(),
                    i.best_guidance.into(),
                    Value::from(""),
                ],
                TraceEvent::Start(iteration) => [
                    Value::from("start"),
                    (*iteration as f64).into(),
                    Value::from(""),
                    Value::from(""),
                    Value::from(""),
                ],
            };
            table.push_row(row)?;
        }
        Ok(table)
    }
}

pub fn parse_trace(output: &str) -> Result<Trace> {
    let mut trace = Trace::default();
    for (idx, line) in output.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line, idx + 1)? {
            LogLine::Move(m) => trace.events.push(TraceEvent::Move(m)),
            LogLine::Improve(i) => trace.events.push(TraceEvent::Improve(i)),
            LogLine::Start { iteration } => trace.events.push(TraceEvent::Start(iteration)),
            LogLine::Min => trace.minimums += 1,
            LogLine::Summary(fields) => trace.summary = Some(fields),
        }
    }
    Ok(trace)
}

/// The last summary line of a low-verbosity run.
pub fn parse_summary(output: &str) -> Result<Vec<String>> {
    let fields = parse_trace(output)?
        .summary
        .ok_or_else(|| ExperimentError::parse(0, "solver output has no summary line"))?;
    if fields.len() != SUMMARY_COLUMNS.len() {
        return Err(ExperimentError::parse(
            0,
            format!(
                "summary has {} fields, expected {}",
                fields.len(),
                SUMMARY_COLUMNS.len()
            ),
        ));
    }
    Ok(fields)
}
