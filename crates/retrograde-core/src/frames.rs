//! Frame-granular reversal of interleaved audio
//!
//! A frame is one sample per channel at one instant, stored contiguously.
//! Reversal reorders whole frames and never touches the order of units
//! inside a frame, so channel identity survives. A plain `slice::reverse`
//! would swap left and right on every stereo frame.
//!
//! The same routine serves both pipelines: the WAV fast path reverses raw
//! bytes with `frame_len = block_align`, the decode path reverses `i16`
//! samples with `frame_len = channels`.

use crate::error::FrameError;

/// Number of whole frames in a buffer, or an error if it doesn't divide
pub fn frame_count(len: usize, frame_len: usize) -> Result<usize, FrameError> {
    if frame_len == 0 {
        return Err(FrameError::ZeroFrameLength);
    }
    let remainder = len % frame_len;
    if remainder != 0 {
        return Err(FrameError::PartialFrame {
            len,
            frame_len,
            remainder,
        });
    }
    Ok(len / frame_len)
}

/// Reverse `data` at frame granularity into a new buffer
///
/// Output frame `i` is input frame `N - 1 - i`. Single allocation of equal
/// size with a linear copy, so odd and even frame counts take the same path.
/// Fails instead of dropping trailing units when `data.len()` is not a
/// multiple of `frame_len`.
pub fn reverse_frames<T: Copy>(data: &[T], frame_len: usize) -> Result<Vec<T>, FrameError> {
    frame_count(data.len(), frame_len)?;

    let mut reversed = Vec::with_capacity(data.len());
    for frame in data.chunks_exact(frame_len).rev() {
        reversed.extend_from_slice(frame);
    }
    Ok(reversed)
}

/// Flatten ordered blocks and reverse the result at frame granularity
///
/// Blocks are concatenated in arrival order first; a block boundary need not
/// fall on a frame boundary, only the total must divide.
pub fn reverse_blocks<T: Copy>(blocks: &[Vec<T>], frame_len: usize) -> Result<Vec<T>, FrameError> {
    let total: usize = blocks.iter().map(Vec::len).sum();
    let mut flat = Vec::with_capacity(total);
    for block in blocks {
        flat.extend_from_slice(block);
    }
    reverse_frames(&flat, frame_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_i_maps_to_n_minus_one_minus_i() {
        // 3 stereo frames of i16: (L,R) pairs
        let data: Vec<i16> = vec![1, -1, 2, -2, 3, -3];
        let reversed = reverse_frames(&data, 2).unwrap();
        assert_eq!(reversed, vec![3, -3, 2, -2, 1, -1]);
    }

    #[test]
    fn test_channel_order_preserved_within_frame() {
        let data: Vec<u8> = (0..24).collect();
        // 16-bit stereo: 4-byte frames
        let reversed = reverse_frames(&data, 4).unwrap();
        let n = data.len() / 4;
        for i in 0..n {
            assert_eq!(
                &reversed[i * 4..(i + 1) * 4],
                &data[(n - 1 - i) * 4..(n - i) * 4]
            );
        }
    }

    #[test]
    fn test_odd_frame_count_middle_frame_stays() {
        let data: Vec<u8> = vec![10, 11, 20, 21, 30, 31];
        let reversed = reverse_frames(&data, 2).unwrap();
        assert_eq!(&reversed[2..4], &[20, 21]);
        assert_eq!(reversed, vec![30, 31, 20, 21, 10, 11]);
    }

    #[test]
    fn test_reversal_is_involution() {
        let data: Vec<u8> = (0..=254).collect();
        // 3 channels of 24-bit: 9-byte frames, 255 bytes = 28 frames + 3
        let trimmed = &data[..252];
        let twice = reverse_frames(&reverse_frames(trimmed, 9).unwrap(), 9).unwrap();
        assert_eq!(twice, trimmed);
    }

    #[test]
    fn test_partial_frame_rejected() {
        let data: Vec<u8> = vec![0; 10];
        assert_eq!(
            reverse_frames(&data, 4),
            Err(FrameError::PartialFrame {
                len: 10,
                frame_len: 4,
                remainder: 2
            })
        );
    }

    #[test]
    fn test_zero_frame_length_rejected() {
        let data: Vec<u8> = vec![1, 2];
        assert_eq!(reverse_frames(&data, 0), Err(FrameError::ZeroFrameLength));
    }

    #[test]
    fn test_empty_buffer() {
        let data: Vec<i16> = Vec::new();
        assert!(reverse_frames(&data, 2).unwrap().is_empty());
    }

    #[test]
    fn test_blocks_concatenate_in_arrival_order() {
        // Numbered mono blocks; block boundary splits nothing
        let blocks = vec![vec![0i16, 1, 2], vec![3, 4], vec![5, 6, 7]];
        let reversed = reverse_blocks(&blocks, 1).unwrap();
        assert_eq!(reversed, vec![7, 6, 5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_blocks_may_split_frames() {
        // Stereo frames (1,-1) (2,-2) (3,-3) split across uneven blocks
        let blocks = vec![vec![1i16, -1, 2], vec![-2, 3, -3]];
        let reversed = reverse_blocks(&blocks, 2).unwrap();
        assert_eq!(reversed, vec![3, -3, 2, -2, 1, -1]);
    }
}
