// src/waveform/terminal.rs

use super::Peaks;

/// Draw an envelope as `height` rows of text, positive up.
pub fn render_ascii(peaks: &Peaks, height: usize) -> Vec<String> {
    let h = height.max(4);
    let mut lines = vec![vec![' '; peaks.len()]; h];
    let to_row = |v: f32| -> usize {
        let clamped = v.clamp(-1.0, 1.0);
        let y = (0.5 - 0.5 * clamped) * (h as f32 - 1.0);
        y.round() as usize
    };

    for x in 0..peaks.len() {
        let y1 = to_row(peaks.max[x]);
        let y0 = to_row(peaks.min[x]);
        let (a, b) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        for row in &mut lines[a..=b] {
            row[x] = '█';
        }
    }
    lines.into_iter().map(|row| row.into_iter().collect()).collect()
}

/// Horizontal level bar, `width` cells for 0..=1.
pub fn meter_bar(level: f32, width: usize) -> String {
    let filled = ((level.clamp(0.0, 1.0) * width as f32).round() as usize).min(width);
    let mut bar = String::with_capacity(width * 3);
    bar.extend(std::iter::repeat_n('█', filled));
    bar.extend(std::iter::repeat_n('·', width - filled));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_draws_the_center_line() {
        let peaks = Peaks {
            min: vec![0.0; 3],
            max: vec![0.0; 3],
        };
        let lines = render_ascii(&peaks, 5);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[2], "███");
        assert_eq!(lines[0], "   ");
    }

    #[test]
    fn full_scale_fills_the_column() {
        let peaks = Peaks {
            min: vec![-1.0],
            max: vec![1.0],
        };
        assert!(render_ascii(&peaks, 4).iter().all(|l| l == "█"));
    }

    #[test]
    fn meter_bar_clamps() {
        assert_eq!(meter_bar(2.0, 4), "████");
        assert_eq!(meter_bar(0.5, 4), "██··");
        assert_eq!(meter_bar(-1.0, 2), "··");
    }
}
