use crate::error::Error;
use crate::manifest::Manifest;
use crate::writer::Writer;
use std::error::Error as StdError;
use std::path::Path;

pub(crate) trait Runner {
    /// The stack manifest, optionally switched to another stage
    fn manifest(&self, path: &Path, stage: Option<&str>) -> Result<Manifest, Error> {
        let mut manifest = Manifest::from_path(path).map_err(|e| {
            log::error!("{e:?}");
            Error::from(e)
        })?;

        if let Some(stage) = stage {
            manifest.set_stage(stage);
        }

        Ok(manifest)
    }

    /// Run the command
    ///
    /// Returns an error shown to the user in case of failure
    fn run(&mut self) -> Result<(), Error>;

    /// Construct an error shown to the user
    fn error(
        &self,
        title: Option<&str>,
        description: Option<&str>,
        origin: Option<Box<dyn StdError>>,
    ) -> Error {
        if let Some(origin) = origin {
            log::error!("{origin:?}");
        }

        if let Some(title) = title {
            Error::new(title, description)
        } else {
            Error::new(
                "Failed to run the command",
                Some("Run again with RUST_LOG=debug to see the details"),
            )
        }
    }
}

/// Return a runner for a command
pub(crate) trait Runnable {
    fn runner<'a>(&self, writer: &'a Writer) -> impl Runner + 'a;
}
