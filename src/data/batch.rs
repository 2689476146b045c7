/// One step's worth of samples: flattened images and encoded labels.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub images: Vec<Vec<f64>>,
    pub labels: Vec<Vec<usize>>,
}

impl Batch {
    pub fn new(images: Vec<Vec<f64>>, labels: Vec<Vec<usize>>) -> Self {
        Batch { images, labels }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
