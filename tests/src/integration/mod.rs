//! Cross-crate integration flows.

#[cfg(test)]
mod flows;
#[cfg(test)]
mod harness;
#[cfg(test)]
mod http;
#[cfg(test)]
mod properties;
