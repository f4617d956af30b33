use crate::models::job::{JobRow, NormalizedJob};

/// Score every posting starts from.
pub const BASE_SCORE: f64 = 0.5;
/// Fixed bonus per satisfied signal.
pub const SIGNAL_BONUS: f64 = 0.1;
/// Employer postings above this score are featured on approval.
pub const FEATURED_THRESHOLD: f64 = 0.8;

const SPAM_TERMS: &[&str] = &["urgent", "immediate"];

/// The fields a quality score reads, borrowed from either an incoming feed
/// posting or a stored row.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualitySignals<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub company: &'a str,
    pub location: &'a str,
    pub salary: Option<&'a str>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub skills: &'a [String],
}

impl<'a> From<&'a NormalizedJob> for QualitySignals<'a> {
    fn from(job: &'a NormalizedJob) -> Self {
        Self {
            title: &job.title,
            description: &job.description,
            company: &job.company,
            location: &job.location,
            salary: job.salary.as_deref(),
            salary_min: job.salary_min,
            salary_max: job.salary_max,
            skills: &job.skills,
        }
    }
}

impl<'a> From<&'a JobRow> for QualitySignals<'a> {
    fn from(job: &'a JobRow) -> Self {
        Self {
            title: &job.title,
            description: &job.description,
            company: job.company.as_deref().unwrap_or(""),
            location: job.location.as_deref().unwrap_or(""),
            salary: job.salary.as_deref(),
            salary_min: job.salary_min,
            salary_max: job.salary_max,
            skills: &job.skills,
        }
    }
}

/// Linear completeness heuristic:
/// base 0.5, then +0.1 for each of
/// - title longer than 10 chars
/// - title free of spam terms ("urgent", "immediate")
/// - description longer than 100 chars
/// - description longer than 500 chars
/// - company longer than 2 chars
/// - location longer than 2 chars
/// - salary text, or both salary bounds
/// - at least one skill
///
/// Clamped to [0, 1].
pub fn compute_quality_score(signals: QualitySignals<'_>) -> f64 {
    let title_len = signals.title.trim().chars().count();
    let description_len = signals.description.trim().chars().count();

    let checks = [
        title_len > 10,
        !has_spam_terms(signals.title),
        description_len > 100,
        description_len > 500,
        signals.company.trim().chars().count() > 2,
        signals.location.trim().chars().count() > 2,
        has_salary(&signals),
        !signals.skills.is_empty(),
    ];

    let bonus = checks.iter().filter(|passed| **passed).count() as f64 * SIGNAL_BONUS;
    (BASE_SCORE + bonus).clamp(0.0, 1.0)
}

pub fn passes_threshold(score: f64, min_quality_score: f64) -> bool {
    score >= min_quality_score
}

fn has_spam_terms(title: &str) -> bool {
    let lower = title.to_lowercase();
    SPAM_TERMS.iter().any(|term| lower.contains(term))
}

fn has_salary(signals: &QualitySignals<'_>) -> bool {
    let text = signals.salary.map(|s| !s.trim().is_empty()).unwrap_or(false);
    text || (signals.salary_min.is_some() && signals.salary_max.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skills(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_posting_keeps_spam_free_bonus() {
        let score = compute_quality_score(QualitySignals::default());
        assert!((score - 0.6).abs() < 1e-9, "Score was {score}");
    }

    #[test]
    fn test_complete_posting_is_clamped_to_one() {
        let long_description = "x".repeat(600);
        let skill_list = skills(&["rust"]);
        let score = compute_quality_score(QualitySignals {
            title: "Senior Backend Engineer",
            description: &long_description,
            company: "Acme Corp",
            location: "Bengaluru",
            salary: Some("12-18 LPA"),
            salary_min: None,
            salary_max: None,
            skills: &skill_list,
        });
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_spam_title_loses_bonus() {
        let clean = compute_quality_score(QualitySignals {
            title: "Backend Engineer",
            ..Default::default()
        });
        let spammy = compute_quality_score(QualitySignals {
            title: "URGENT Backend Engineer",
            ..Default::default()
        });
        assert!(spammy < clean);
    }

    #[test]
    fn test_salary_bounds_need_both_ends() {
        let one_bound = compute_quality_score(QualitySignals {
            salary_min: Some(1000.0),
            ..Default::default()
        });
        let both = compute_quality_score(QualitySignals {
            salary_min: Some(1000.0),
            salary_max: Some(2000.0),
            ..Default::default()
        });
        assert!((both - one_bound - SIGNAL_BONUS).abs() < 1e-9);
    }

    #[test]
    fn test_monotonic_in_description_length() {
        let mut previous = 0.0;
        for len in [0, 50, 101, 300, 501, 2000] {
            let description = "d".repeat(len);
            let score = compute_quality_score(QualitySignals {
                description: &description,
                ..Default::default()
            });
            assert!(score >= previous, "len {len} dropped the score");
            previous = score;
        }
    }

    #[test]
    fn test_monotonic_in_title_length_and_extra_fields() {
        let base = QualitySignals {
            title: "Dev",
            ..Default::default()
        };
        let longer_title = QualitySignals {
            title: "Developer, Platform Team",
            ..base
        };
        let skill_list = skills(&["go"]);
        let with_skills = QualitySignals {
            skills: &skill_list,
            ..longer_title
        };
        let with_company = QualitySignals {
            company: "Globex",
            ..with_skills
        };

        let scores: Vec<f64> = [base, longer_title, with_skills, with_company]
            .into_iter()
            .map(compute_quality_score)
            .collect();
        assert!(scores.windows(2).all(|w| w[1] >= w[0]), "{scores:?}");
    }

    #[test]
    fn test_always_bounded() {
        let huge = "y".repeat(10_000);
        let skill_list = skills(&["a", "b", "c"]);
        let score = compute_quality_score(QualitySignals {
            title: &huge,
            description: &huge,
            company: &huge,
            location: &huge,
            salary: Some(&huge),
            salary_min: Some(1.0),
            salary_max: Some(2.0),
            skills: &skill_list,
        });
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert!(passes_threshold(0.6, 0.6));
        assert!(!passes_threshold(0.59, 0.6));
    }
}
