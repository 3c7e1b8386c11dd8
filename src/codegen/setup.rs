//! Programs run once per interpreter during initialization.

use super::{render, string, string_vector};

/// Add-on packages every procedure relies on.
pub const REQUIRED_PACKAGES: &[&str] = &["psych", "GPArotation", "lavaan"];

const CONFIGURE_REPOS: &str = r#"
options(repos = c(binary = {{BINARY}}, source = {{SOURCE}}))
list(repos = unname(getOption("repos")))
"#;

const INSTALL_PACKAGES: &str = r#"
.pkgs <- {{PACKAGES}}
.have <- function(p) vapply(p, requireNamespace, logical(1), quietly = TRUE)
.missing <- .pkgs[!.have(.pkgs)]
.installed <- character(0)
if (length(.missing) > 0) {
  for (.repo in getOption("repos")) {
    .todo <- .missing[!.have(.missing)]
    if (length(.todo) == 0) break
    try(utils::install.packages(.todo, repos = .repo, quiet = TRUE), silent = TRUE)
  }
  .still <- .missing[!.have(.missing)]
  if (length(.still) > 0) stop(sprintf("Could not install packages: %s", paste(.still, collapse = ", ")))
  .installed <- .missing
}
list(installed = .installed)
"#;

const LOAD_PACKAGES: &str = r#"
.pkgs <- {{PACKAGES}}
for (.p in .pkgs) suppressPackageStartupMessages(library(.p, character.only = TRUE))
list(loaded = .pkgs)
"#;

/// Binary repository first, source repository as fallback.
pub fn configure_repositories(binary: &str, source: &str) -> String {
    render(
        CONFIGURE_REPOS,
        &[("BINARY", string(binary)), ("SOURCE", string(source))],
    )
}

/// Install whichever of `packages` are missing, trying each configured repository in
/// priority order.
pub fn install_packages<S: AsRef<str>>(packages: &[S]) -> String {
    render(INSTALL_PACKAGES, &[("PACKAGES", string_vector(packages))])
}

/// Attach `packages` to the search path.
pub fn load_packages<S: AsRef<str>>(packages: &[S]) -> String {
    render(LOAD_PACKAGES, &[("PACKAGES", string_vector(packages))])
}
