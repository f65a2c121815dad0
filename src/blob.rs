use crate::types::AreaBounds;
use ndarray::Array2;

/// A 4-connected component of passable cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blob {
    /// 1-based; 0 marks impassable cells in the label grid.
    pub label: u32,
    pub area: u64,
}

#[derive(Debug, Clone)]
pub struct Blobs {
    labels: Array2<u32>,
    areas: Vec<u64>,
}

impl Blobs {
    /// Labels components in raster order of their first cell.
    pub fn label(passable: &Array2<bool>) -> Self {
        let (rows, cols) = passable.dim();
        let mut labels = Array2::<u32>::zeros((rows, cols));
        let mut areas = Vec::new();
        let mut stack = Vec::new();

        for start in (0..rows).flat_map(|r| (0..cols).map(move |c| (r, c))) {
            if !passable[start] || labels[start] != 0 {
                continue;
            }
            let label = areas.len() as u32 + 1;
            let mut area = 0u64;
            labels[start] = label;
            stack.push(start);
            while let Some((r, c)) = stack.pop() {
                area += 1;
                let neighbours = [
                    (r.wrapping_sub(1), c),
                    (r + 1, c),
                    (r, c.wrapping_sub(1)),
                    (r, c + 1),
                ];
                for (nr, nc) in neighbours {
                    if nr < rows && nc < cols && passable[(nr, nc)] && labels[(nr, nc)] == 0 {
                        labels[(nr, nc)] = label;
                        stack.push((nr, nc));
                    }
                }
            }
            areas.push(area);
        }

        Self { labels, areas }
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Blob> + '_ {
        self.areas.iter().enumerate().map(|(i, &area)| Blob {
            label: i as u32 + 1,
            area,
        })
    }

    /// Largest blob whose area lies in `bounds`; the earliest wins a tie.
    pub fn largest_within(&self, bounds: AreaBounds) -> Option<Blob> {
        self.iter()
            .filter(|b| bounds.contains(b.area))
            .fold(None, |best: Option<Blob>, b| match best {
                Some(best) if best.area >= b.area => Some(best),
                _ => Some(b),
            })
    }

    pub fn mask(&self, label: u32) -> Array2<bool> {
        self.labels.mapv(|l| l == label)
    }
}
