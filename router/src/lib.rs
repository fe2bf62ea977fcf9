pub mod algo;
pub mod detailed_router;
pub mod global_router;
pub mod grid;
pub mod obstacles;
pub mod realize;
pub mod session;
pub mod utils;
pub mod via_escape;

pub use session::{MultiNetReport, Net, Session};

use sky130_common::db::core::{GeometrySink, PolygonSource};
use sky130_common::db::layer::PdkConfig;
use sky130_common::db::port::Port;
use sky130_common::db::route::RouteResult;
use sky130_common::error::Result;
use sky130_common::util::config::RouterConfig;

/// Connects `source` to `sink` in a one-net session on the SkyWater 130 stack.
pub fn route<C: PolygonSource + GeometrySink>(
    component: &mut C,
    source: &Port,
    sink: &Port,
    config: &RouterConfig,
) -> Result<RouteResult> {
    let mut session = Session::new(&*component, config.clone(), PdkConfig::sky130(), None)?;
    let net = Net::new(
        format!("{}-{}", source.name, sink.name),
        source.clone(),
        sink.clone(),
    );
    session.route_net(component, &net)
}

/// Routes `nets` in order in one session; see [`Session::route_nets`].
pub fn route_nets<C: PolygonSource + GeometrySink + Clone>(
    component: &mut C,
    nets: &[Net],
    config: &RouterConfig,
) -> Result<MultiNetReport> {
    let mut session = Session::new(&*component, config.clone(), PdkConfig::sky130(), None)?;
    session.route_nets(component, nets)
}
