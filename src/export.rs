use std::io::Write;

use csv::WriterBuilder;

use crate::discriminant::Discriminants;
use crate::error::Result;

/// Write one `index,label,proj1,proj2` row per labeled sample, then the
/// unlabeled points with an empty label.
pub fn write_projections<W: Write>(discriminants: &Discriminants, out: W) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(out);
    writer.write_record(["index", "label", "proj1", "proj2"])?;

    for (index, (point, label)) in discriminants
        .labeled_points()
        .zip(&discriminants.labels)
        .enumerate()
    {
        writer.write_record([
            index.to_string(),
            label.to_string(),
            point.x.to_string(),
            point.y.to_string(),
        ])?;
    }

    let offset = discriminants.labels.len();
    for (index, point) in discriminants.unlabeled.iter().enumerate() {
        writer.write_record([
            (offset + index).to_string(),
            String::new(),
            point.x.to_string(),
            point.y.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point2;
    use crate::trainer::Separator;
    use nalgebra::DVector;

    #[test]
    fn test_rows_follow_sample_order() {
        let discriminants = Discriminants {
            first: Separator::new(DVector::from_vec(vec![1.0]), 0.0),
            second: Separator::new(DVector::from_vec(vec![1.0]), 0.0),
            proj1: vec![-1.5, 2.0],
            proj2: vec![0.25, -0.5],
            labels: vec![-1.0, 1.0],
            unlabeled: vec![Point2::new(0.125, 3.0)],
        };

        let mut out = Vec::new();
        write_projections(&discriminants, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "index,label,proj1,proj2",
                "0,-1,-1.5,0.25",
                "1,1,2,-0.5",
                "2,,0.125,3",
            ]
        );
    }
}
