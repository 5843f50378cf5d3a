use itertools::iproduct;
use once_cell::sync::Lazy;

use crate::datastructures::*;

#[cfg(test)]
mod tests;

pub const WINDOW_SIZES: [u32; 6] = [1, 2, 4, 8, 16, 32];

/// Fixed lambda values in solver units: 0.1 to 9.7 in steps of 0.3.
pub static LAMBDA_SCAN: Lazy<Vec<Lambda>> =
    Lazy::new(|| (1..100).step_by(3).map(Lambda::Fixed).collect());

/// Solver debug mask bits.
pub const DEBUG_SOLUTION: u32 = 4;
pub const DEBUG_MINIMUM: u32 = 8;
pub const DEBUG_MOVES: u32 = 16;

/// A named solver variant of the moves family.
pub struct MoveVariant {
    pub name: &'static str,
    pub reset_weights: bool,
    pub aspiration: bool,
    pub dynamic_lambda: bool,
}

pub static MOVE_VARIANTS: Lazy<Vec<MoveVariant>> = Lazy::new(|| {
    vec![
        MoveVariant {
            name: "clean",
            reset_weights: true,
            aspiration: false,
            dynamic_lambda: false,
        },
        MoveVariant {
            name: "aspiration",
            reset_weights: true,
            aspiration: true,
            dynamic_lambda: false,
        },
        MoveVariant {
            name: "keep",
            reset_weights: false,
            aspiration: false,
            dynamic_lambda: false,
        },
        MoveVariant {
            name: "dynamic",
            reset_weights: true,
            aspiration: false,
            dynamic_lambda: true,
        },
        MoveVariant {
            name: "asp_keep",
            reset_weights: false,
            aspiration: true,
            dynamic_lambda: false,
        },
        MoveVariant {
            name: "asp_dynamic",
            reset_weights: true,
            aspiration: true,
            dynamic_lambda: true,
        },
    ]
});

/// One point of a sweep together with the label columns it is reported under.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepEntry {
    pub point: SweepPoint,
    pub labels: Vec<String>,
    /// File stem of the raw log, unique within the family.
    pub slug: String,
}

#[derive(Debug, Clone, Copy)]
pub struct SweepSpec {
    pub family: SweepFamily,
    pub scratch: ScratchPolicy,
}

impl SweepSpec {
    pub fn new(family: SweepFamily) -> Self {
        Self {
            family,
            scratch: ScratchPolicy::default(),
        }
    }

    pub fn with_scratch(mut self, scratch: ScratchPolicy) -> Self {
        self.scratch = scratch;
        self
    }

    /// Label columns that precede the solver summary in the per-graph table.
    pub fn label_columns(&self) -> &'static [&'static str] {
        match self.family {
            SweepFamily::Strategy => &["init", "source", "destination"],
            SweepFamily::Meta => &["A", "P", "L", "SW"],
            SweepFamily::Moves => &["build", "variant"],
        }
    }

    /// Overrides every run of the family gets on top of its sweep point.
    pub fn fixed_overrides(&self) -> Vec<(&'static str, String)> {
        let debug = match self.family {
            SweepFamily::Strategy | SweepFamily::Meta => DEBUG_SOLUTION,
            SweepFamily::Moves => DEBUG_MINIMUM | DEBUG_MOVES,
        };
        vec![("DEBUG", debug.to_string())]
    }

    /// All points of the family, in the order their rows are written.
    pub fn entries(&self) -> Vec<SweepEntry> {
        match self.family {
            SweepFamily::Strategy => self.strategy_entries(),
            SweepFamily::Meta => meta_entries(),
            SweepFamily::Moves => moves_entries(),
        }
    }

    fn strategy_entries(&self) -> Vec<SweepEntry> {
        let base = SweepPoint {
            build_strategy: BuildStrategy::Random,
            update_strategy: UpdateStrategy::UseHistory,
            source_target: Target::Minimal,
            destination_target: Target::Maximum,
            reset_weights: true,
            aspiration: false,
            dynamic_lambda: true,
            lambda: Lambda::Dynamic,
            window_size: 2,
        };
        let mut entries = Vec::new();
        for build in BuildStrategy::ALL {
            let with_scratch = match self.scratch {
                ScratchPolicy::EveryBuild => true,
                ScratchPolicy::RandomOnly => build == BuildStrategy::Random,
            };
            if with_scratch {
                entries.push(SweepEntry {
                    point: SweepPoint {
                        build_strategy: build,
                        update_strategy: UpdateStrategy::Scratch,
                        ..base
                    },
                    labels: vec!["Scratch".into(), String::new(), String::new()],
                    slug: format!("{}-Scratch", build.name()),
                });
            }
            for (source, destination) in iproduct!(Target::ALL, Target::ALL) {
                entries.push(SweepEntry {
                    point: SweepPoint {
                        build_strategy: build,
                        source_target: source,
                        destination_target: destination,
                        ..base
                    },
                    labels: vec![
                        build.name().into(),
                        source.name().into(),
                        destination.name().into(),
                    ],
                    slug: format!(
                        "{}-{}-{}",
                        build.name(),
                        source.name(),
                        destination.name()
                    ),
                });
            }
        }
        entries
    }
}

fn meta_entries() -> Vec<SweepEntry> {
    let base = SweepPoint {
        build_strategy: BuildStrategy::Bipartite,
        update_strategy: UpdateStrategy::UseHistory,
        source_target: Target::Minimal,
        destination_target: Target::Maximum,
        reset_weights: true,
        aspiration: false,
        dynamic_lambda: false,
        lambda: Lambda::Fixed(DEFAULT_LAMBDA),
        window_size: 2,
    };
    let mut entries = Vec::new();
    for (window_size, aspiration, reset_weights) in
        iproduct!(WINDOW_SIZES, [false, true], [false, true])
    {
        let point = SweepPoint {
            window_size,
            aspiration,
            reset_weights,
            ..base
        };
        // Keeping penalties and a dynamic lambda cannot be combined in the solver.
        let dynamic = reset_weights.then_some(SweepPoint {
            dynamic_lambda: true,
            lambda: Lambda::Dynamic,
            ..point
        });
        let fixed = LAMBDA_SCAN.iter().map(|&lambda| SweepPoint { lambda, ..point });
        for point in dynamic.into_iter().chain(fixed) {
            let labels = vec![
                u8::from(point.aspiration).to_string(),
                u8::from(point.reset_weights).to_string(),
                point.lambda.to_string(),
                point.window_size.to_string(),
            ];
            let slug = format!(
                "A{}-P{}-L{}-SW{}",
                labels[0], labels[1], labels[2], labels[3]
            );
            entries.push(SweepEntry {
                point,
                labels,
                slug,
            });
        }
    }
    entries
}

fn moves_entries() -> Vec<SweepEntry> {
    iproduct!(MOVE_VARIANTS.iter(), BuildStrategy::ALL)
        .map(|(variant, build)| SweepEntry {
            point: SweepPoint {
                build_strategy: build,
                update_strategy: UpdateStrategy::UseHistory,
                source_target: Target::Minimal,
                destination_target: Target::Maximum,
                reset_weights: variant.reset_weights,
                aspiration: variant.aspiration,
                dynamic_lambda: variant.dynamic_lambda,
                lambda: if variant.dynamic_lambda {
                    Lambda::Dynamic
                } else {
                    Lambda::Fixed(DEFAULT_LAMBDA)
                },
                window_size: 2,
            },
            labels: vec![build.id().to_string(), variant.name.to_string()],
            slug: format!("moves.{}.{}", build.id(), variant.name),
        })
        .collect()
}
