//! Planar audio blocks handed to the plugin

/// Non-interleaved input/output buffer pair for one render step
///
/// Each channel is a contiguous run of `frames` samples. Inputs start
/// silent; outputs are zeroed before every call into the plugin.
///
/// # Examples
///
/// ```
/// use plughost::AudioBlock;
///
/// let mut block = AudioBlock::new(2, 2, 512);
/// assert_eq!(block.frames(), 512);
///
/// let (inputs, mut outputs) = block.split();
/// assert_eq!(inputs.len(), 2);
/// outputs[1][0] = 0.5;
/// drop(outputs);
/// assert_eq!(block.output(1)[0], 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct AudioBlock {
    inputs: Vec<Vec<f32>>,
    outputs: Vec<Vec<f32>>,
    frames: usize,
}

impl AudioBlock {
    /// Allocate a silent block
    pub fn new(input_channels: usize, output_channels: usize, frames: usize) -> Self {
        Self {
            inputs: vec![vec![0.0; frames]; input_channels],
            outputs: vec![vec![0.0; frames]; output_channels],
            frames,
        }
    }

    /// Frames per channel
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn input_channels(&self) -> usize {
        self.inputs.len()
    }

    #[inline]
    pub fn output_channels(&self) -> usize {
        self.outputs.len()
    }

    /// Mutable access to one input channel
    pub fn input_mut(&mut self, channel: usize) -> &mut [f32] {
        &mut self.inputs[channel]
    }

    /// One output channel
    pub fn output(&self, channel: usize) -> &[f32] {
        &self.outputs[channel]
    }

    /// Borrow inputs immutably and outputs mutably at the same time
    pub fn split(&mut self) -> (Vec<&[f32]>, Vec<&mut [f32]>) {
        let inputs = self.inputs.iter().map(Vec::as_slice).collect();
        let outputs = self.outputs.iter_mut().map(Vec::as_mut_slice).collect();
        (inputs, outputs)
    }

    /// Zero every output channel
    pub fn clear_outputs(&mut self) {
        for channel in &mut self.outputs {
            channel.fill(0.0);
        }
    }

    /// Interleave `channels` output channels into `dest`, mapping each frame through `convert`
    ///
    /// A plugin with fewer outputs than requested channels has its last
    /// output repeated; a plugin with no outputs yields silence.
    pub fn interleave_into<T, F>(&self, channels: usize, dest: &mut Vec<T>, mut convert: F)
    where
        F: FnMut(f32) -> T,
    {
        dest.reserve(self.frames * channels);
        for frame in 0..self.frames {
            for channel in 0..channels {
                let sample = match self.outputs.len() {
                    0 => 0.0,
                    n => self.outputs[channel.min(n - 1)][frame],
                };
                dest.push(convert(sample));
            }
        }
    }
}
