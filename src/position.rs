/// Cartesian coordinate position of a topology object.
///
/// Coordinates are optional so that an object which was never placed exports no
/// position at all.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Position {
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
}

impl Position {
    pub fn new(x: Option<f64>, y: Option<f64>, z: Option<f64>) -> Position {
        Position { x, y, z }
    }

    /// Update the position. Returns `true` if the position actually changed,
    /// `false` if all three coordinates are unchanged. Callers use the return
    /// value to decide whether to propagate the position to dependents.
    pub fn set(&mut self, x: Option<f64>, y: Option<f64>, z: Option<f64>) -> bool {
        if self.x == x && self.y == y && self.z == z {
            return false;
        }
        self.x = x;
        self.y = y;
        self.z = z;
        true
    }

    pub fn get(&self) -> (Option<f64>, Option<f64>, Option<f64>) {
        (self.x, self.y, self.z)
    }
}
