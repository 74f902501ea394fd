pub(crate) mod bitmap;
pub(crate) mod compositor;
pub(crate) mod raster;
