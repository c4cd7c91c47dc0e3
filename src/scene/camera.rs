use crate::math::Matrix4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub projection_matrix: Matrix4,
    pub matrix: Matrix4,
    pub matrix_world: Matrix4,
    pub matrix_world_inverse: Matrix4,
    pub matrix_auto_update: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            projection_matrix: Matrix4::identity(),
            matrix: Matrix4::identity(),
            matrix_world: Matrix4::identity(),
            matrix_world_inverse: Matrix4::identity(),
            matrix_auto_update: true,
        }
    }
}

impl Camera {
    /// The camera is never parented, so its world matrix is its local matrix.
    pub fn update_matrix_world(&mut self) {
        if self.matrix_auto_update {
            self.matrix = Matrix4::compose(self.position, self.rotation, [1.0; 3]);
        }
        self.matrix_world = self.matrix;
        match self.matrix_world.inverse() {
            Some(inverse) => self.matrix_world_inverse = inverse,
            None => log::warn!("[camera] world matrix is singular; keeping previous view matrix"),
        }
    }
}
