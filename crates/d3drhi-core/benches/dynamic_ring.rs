#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
#[cfg(not(target_arch = "wasm32"))]
use d3drhi_core::dynamic_ring::{BufferBinding, DynamicBufferDevice, DynamicBufferRing, MapMode};

/// Copies into plain memory so the benchmark measures the ring bookkeeping
/// plus a realistic memcpy.
#[cfg(not(target_arch = "wasm32"))]
struct HostBuffers {
    buffers: Vec<Vec<u8>>,
}

#[cfg(not(target_arch = "wasm32"))]
impl DynamicBufferDevice for HostBuffers {
    type Buffer = usize;

    fn create_dynamic_buffer(
        &mut self,
        _binding: BufferBinding,
        byte_width: u32,
    ) -> d3drhi_core::Result<usize> {
        self.buffers.push(vec![0; byte_width as usize]);
        Ok(self.buffers.len() - 1)
    }

    fn write_dynamic_buffer(
        &mut self,
        buffer: &usize,
        _mode: MapMode,
        offset: u32,
        data: &[u8],
    ) -> d3drhi_core::Result<()> {
        let start = offset as usize;
        self.buffers[*buffer][start..start + data.len()].copy_from_slice(data);
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn bench_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("dynamic_ring");
    for &(vertices, stride) in &[(4u32, 16u32), (256, 32), (4096, 32)] {
        let bytes = vec![0xABu8; (vertices * stride) as usize];
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_function(format!("fill_{vertices}x{stride}"), |b| {
            let mut device = HostBuffers {
                buffers: Vec::new(),
            };
            let mut ring = DynamicBufferRing::new(1024 * 1024, 3);
            b.iter(|| {
                let alloc = ring
                    .fill_buffer(
                        &mut device,
                        vertices,
                        stride,
                        black_box(&bytes),
                        BufferBinding::Vertex,
                    )
                    .unwrap();
                black_box(alloc.offset);
            });
        });
    }
    group.finish();
}

#[cfg(not(target_arch = "wasm32"))]
criterion_group!(benches, bench_fill);
#[cfg(not(target_arch = "wasm32"))]
criterion_main!(benches);
