use std::fmt::{self, Display, Formatter};

#[derive(thiserror::Error, Debug)]
pub enum ReleaseErrorKind {
    #[error("Decommission of component '{component}' failed: {source}")]
    Decommission { component: String, source: anyhow::Error },
    #[error("{}", Failures(.0))]
    Multiple(Vec<ReleaseErrorKind>),
}

struct Failures<'a>(&'a [ReleaseErrorKind]);

impl Display for Failures<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} decommission step(s) failed:", self.0.len())?;
        for failure in self.0 {
            write!(f, "\n- {failure}")?;
        }
        Ok(())
    }
}

impl ReleaseErrorKind {
    /// Folds the failures of one release walk: nothing, the single error, or all of them.
    pub(crate) fn collect(mut failures: Vec<ReleaseErrorKind>) -> Result<(), ReleaseErrorKind> {
        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(ReleaseErrorKind::Multiple(
                failures
                    .into_iter()
                    .flat_map(|failure| match failure {
                        ReleaseErrorKind::Multiple(inner) => inner,
                        single => vec![single],
                    })
                    .collect(),
            )),
        }
    }

    /// Number of individual decommission failures.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ReleaseErrorKind::Decommission { .. } => 1,
            ReleaseErrorKind::Multiple(inner) => inner.iter().map(ReleaseErrorKind::len).sum(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
