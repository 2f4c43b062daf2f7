//! Typed representation of an ffmpeg `-filter_complex` graph.
//!
//! Composition logic builds [`FilterGraph`] values; the textual ffmpeg syntax
//! only appears when the graph is formatted with `Display`.

use std::fmt;

/// How `scale` treats the source aspect ratio relative to the target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectMode {
    /// Stretch to exactly the given size.
    Exact,
    /// Grow until the box is covered; the overflow is cropped afterwards.
    Cover,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Scale {
        width: u32,
        height: u32,
        aspect: AspectMode,
    },
    /// Centered crop.
    Crop { width: u32, height: u32 },
    SetSar { num: u32, den: u32 },
    Overlay { x: i32, y: i32 },
    Format { pix_fmt: String },
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Scale {
                width,
                height,
                aspect,
            } => {
                write!(f, "scale={}:{}", width, height)?;
                match aspect {
                    AspectMode::Exact => Ok(()),
                    AspectMode::Cover => f.write_str(":force_original_aspect_ratio=increase"),
                }
            }
            Filter::Crop { width, height } => write!(f, "crop={}:{}", width, height),
            Filter::SetSar { num, den } => write!(f, "setsar={}/{}", num, den),
            Filter::Overlay { x, y } => write!(f, "overlay={}:{}", x, y),
            Filter::Format { pix_fmt } => write!(f, "format={}", pix_fmt),
        }
    }
}

/// A linear chain of filters between labelled pads, e.g. `[0:v]scale=..,crop=..[bg]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterChain {
    pub inputs: Vec<String>,
    pub filters: Vec<Filter>,
    pub outputs: Vec<String>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, label: impl Into<String>) -> Self {
        self.inputs.push(label.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn output(mut self, label: impl Into<String>) -> Self {
        self.outputs.push(label.into());
        self
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "[{}]", input)?;
        }
        for (idx, filter) in self.filters.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", filter)?;
        }
        for output in &self.outputs {
            write!(f, "[{}]", output)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterGraph {
    pub chains: Vec<FilterChain>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain(mut self, chain: FilterChain) -> Self {
        self.chains.push(chain);
        self
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, chain) in self.chains.iter().enumerate() {
            if idx > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}", chain)?;
        }
        Ok(())
    }
}

/// Background cover-scale, exact crop and square pixels, with the overlay
/// stretched to the same box and laid over it at the origin.
///
/// Input 0 is the background video, input 1 the overlay image. The result is
/// exposed on the `label` pad.
pub fn cover_and_overlay(width: u32, height: u32, label: &str) -> FilterGraph {
    FilterGraph::new()
        .chain(
            FilterChain::new()
                .input("0:v")
                .filter(Filter::Scale {
                    width,
                    height,
                    aspect: AspectMode::Cover,
                })
                .filter(Filter::Crop { width, height })
                .filter(Filter::SetSar { num: 1, den: 1 })
                .output("bg"),
        )
        .chain(
            FilterChain::new()
                .input("1:v")
                .filter(Filter::Scale {
                    width,
                    height,
                    aspect: AspectMode::Exact,
                })
                .filter(Filter::Format {
                    pix_fmt: "rgba".to_string(),
                })
                .output("ov"),
        )
        .chain(
            FilterChain::new()
                .input("bg")
                .input("ov")
                .filter(Filter::Overlay { x: 0, y: 0 })
                .output(label),
        )
}
