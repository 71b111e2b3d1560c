use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput, BenchmarkId};
use invarmol::*;
use petgraph::graph::NodeIndex;

fn ring(size: usize) -> system::BondGraph {
    let carbon: element::Element = "C".parse().unwrap();
    let mut graph = system::BondGraph::default();
    for _ in 0..size {
        graph.add_node(system::AtomAttributes {element: carbon, hydrogens: 2});
    }
    for i in 0..size {
        graph.add_edge(NodeIndex::new(i), NodeIndex::new((i + 1) % size), ());
    }
    graph
}

fn isomorphisms(c: &mut Criterion) {
    let mut bench_group = c.benchmark_group("ring automorphisms");
    let plot_config = criterion::PlotConfiguration::default()
        .summary_scale(criterion::AxisScale::Logarithmic);
    bench_group.plot_config(plot_config);

    for size in [3, 6, 12, 24, 48] {
        let graph = ring(size);
        let copy = graph.clone();

        bench_group.throughput(Throughput::Elements(size as u64));
        bench_group.bench_with_input(
            BenchmarkId::new("include", size as u64),
            &(size as u64),
            |b, _| b.iter(|| isomorphism::isomorphisms(black_box(&graph), black_box(&copy), isomorphism::SelfComparison::Include))
        );
    }
}

criterion_group!(benches, isomorphisms);
criterion_main!(benches);
